/// Mesh asset loading: format detection, chunked reads with progress, and a
/// single-shot background load task
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use log::{debug, info};

use crate::error::LoadError;
use crate::geometry::Mesh;
use crate::{ply, stl};

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    Ply,
    Stl,
}

impl MeshFormat {
    /// Sniff the format from leading bytes, falling back to the file extension
    pub fn detect(data: &[u8], path: Option<&Path>) -> Result<Self, LoadError> {
        if data.starts_with(b"ply\n") || data.starts_with(b"ply\r\n") {
            return Ok(MeshFormat::Ply);
        }
        if data.starts_with(b"solid") {
            return Ok(MeshFormat::Stl);
        }

        let extension = path
            .and_then(|p| p.extension())
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension.as_deref() {
            Some("ply") => Ok(MeshFormat::Ply),
            Some("stl") => Ok(MeshFormat::Stl),
            Some(other) => Err(LoadError::UnsupportedFormat(other.to_string())),
            None => Err(LoadError::UnsupportedFormat("unknown".to_string())),
        }
    }
}

/// Decode an in-memory asset
pub fn parse_mesh(data: &[u8], path: Option<&Path>) -> Result<Mesh, LoadError> {
    let format = MeshFormat::detect(data, path)?;
    debug!("decoding {} bytes as {:?}", data.len(), format);
    match format {
        MeshFormat::Ply => ply::parse_ply(data),
        MeshFormat::Stl => stl::parse_stl(data),
    }
}

/// Read everything from `reader`, reporting the percentage loaded after each chunk.
///
/// `total` is the expected size in bytes; when it is zero no progress is reported.
pub fn read_with_progress<R: Read>(
    mut reader: R,
    total: u64,
    mut on_progress: impl FnMut(f32),
) -> std::io::Result<Vec<u8>> {
    let mut data = Vec::with_capacity(total as usize);
    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&chunk[..n]);
        if total > 0 {
            on_progress((data.len() as f32 / total as f32 * 100.0).min(100.0));
        }
    }
    Ok(data)
}

/// Load a mesh from disk
pub fn load_mesh(path: impl AsRef<Path>, on_progress: impl FnMut(f32)) -> Result<Mesh, LoadError> {
    let path = path.as_ref();
    let io_err = |source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_err)?;
    let total = file.metadata().map(|m| m.len()).unwrap_or(0);
    let data = read_with_progress(file, total, on_progress).map_err(io_err)?;

    let mesh = parse_mesh(&data, Some(path))?;
    info!(
        "loaded {}: {} vertices, {} triangles",
        path.display(),
        mesh.vertex_count(),
        mesh.face_count()
    );
    Ok(mesh)
}

#[derive(Debug)]
pub enum LoadEvent {
    Progress(f32),
    Done(Result<Mesh, LoadError>),
}

/// A mesh load running on a worker thread. Completes exactly once with
/// [`LoadEvent::Done`], preceded by zero or more progress events.
pub struct LoadTask {
    path: PathBuf,
    events: Receiver<LoadEvent>,
    handle: Option<JoinHandle<()>>,
    finished: bool,
}

impl LoadTask {
    pub fn spawn(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (tx, rx) = mpsc::channel();
        let worker_path = path.clone();
        let handle = thread::spawn(move || {
            let progress_tx = tx.clone();
            let result = load_mesh(&worker_path, |pct| {
                let _ = progress_tx.send(LoadEvent::Progress(pct));
            });
            let _ = tx.send(LoadEvent::Done(result));
        });

        Self {
            path,
            events: rx,
            handle: Some(handle),
            finished: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Non-blocking poll for the next event
    pub fn poll(&mut self) -> Option<LoadEvent> {
        if self.finished {
            return None;
        }
        match self.events.try_recv() {
            Ok(event) => Some(self.observe(event)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(self.observe(LoadEvent::Done(Err(LoadError::Interrupted)))),
        }
    }

    /// Block until the load completes, forwarding progress to `on_progress`
    pub fn wait(mut self, mut on_progress: impl FnMut(f32)) -> Result<Mesh, LoadError> {
        loop {
            let event = self
                .events
                .recv()
                .unwrap_or(LoadEvent::Done(Err(LoadError::Interrupted)));
            match self.observe(event) {
                LoadEvent::Progress(pct) => on_progress(pct),
                LoadEvent::Done(result) => return result,
            }
        }
    }

    fn observe(&mut self, event: LoadEvent) -> LoadEvent {
        if matches!(event, LoadEvent::Done(_)) {
            self.finished = true;
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_detect_by_magic() {
        assert_eq!(MeshFormat::detect(b"ply\nformat", None).unwrap(), MeshFormat::Ply);
        assert_eq!(MeshFormat::detect(b"solid x", None).unwrap(), MeshFormat::Stl);
    }

    #[test]
    fn test_detect_by_extension() {
        let stl = Path::new("model.STL");
        assert_eq!(MeshFormat::detect(&[0u8; 84], Some(stl)).unwrap(), MeshFormat::Stl);

        let obj = Path::new("model.obj");
        assert!(matches!(
            MeshFormat::detect(&[0u8; 4], Some(obj)),
            Err(LoadError::UnsupportedFormat(ext)) if ext == "obj"
        ));
    }

    #[test]
    fn test_progress_reaches_hundred() {
        let data = vec![7u8; CHUNK_SIZE * 2 + 10];
        let mut reports = Vec::new();
        let read = read_with_progress(Cursor::new(&data), data.len() as u64, |p| reports.push(p)).unwrap();

        assert_eq!(read.len(), data.len());
        assert_eq!(reports.len(), 3);
        assert!(reports.windows(2).all(|w| w[0] <= w[1]));
        assert!((reports[2] - 100.0).abs() < 1e-4);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_mesh("/definitely/not/here.ply", |_| {}).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn test_task_reports_failure_once() {
        let mut task = LoadTask::spawn("/definitely/not/here.ply");
        let result = loop {
            match task.poll() {
                Some(LoadEvent::Done(result)) => break result,
                Some(LoadEvent::Progress(_)) | None => thread::yield_now(),
            }
        };
        assert!(result.is_err());
        assert!(task.poll().is_none());
    }

    #[test]
    fn test_task_loads_file() {
        let path = std::env::temp_dir().join(format!("sb3d-loader-{}.ply", std::process::id()));
        std::fs::write(
            &path,
            "ply\nformat ascii 1.0\nelement vertex 3\nproperty float x\nproperty float y\nproperty float z\nelement face 1\nproperty list uchar int vertex_indices\nend_header\n0 0 0\n1 0 0\n0 1 0\n3 0 1 2\n",
        )
        .unwrap();

        let mut last = 0.0;
        let mesh = LoadTask::spawn(&path).wait(|p| last = p).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(mesh.face_count(), 1);
        assert!((last - 100.0).abs() < 1e-4);
    }
}
