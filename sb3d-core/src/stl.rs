/// STL file parser for binary and ASCII formats
use nalgebra::Point3;
use nom::{
    bytes::complete::tag,
    character::complete::{multispace0, multispace1, not_line_ending},
    multi::many0,
    number::complete::float,
    sequence::preceded,
    IResult,
};

use crate::error::LoadError;
use crate::geometry::{Mesh, Triangle};

const HEADER_LEN: usize = 80;
const FACET_LEN: usize = 50;

/// Parse a binary STL file
pub fn parse_binary_stl(data: &[u8]) -> Result<Mesh, LoadError> {
    if data.len() < HEADER_LEN + 4 {
        return Err(LoadError::Stl("file too small to be a valid STL".to_string()));
    }

    // Skip 80-byte header
    let data = &data[HEADER_LEN..];

    let triangle_count = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let facets = &data[4..];
    if facets.len() < triangle_count.saturating_mul(FACET_LEN) {
        return Err(LoadError::Stl(format!(
            "header declares {} triangles but only {} fit",
            triangle_count,
            facets.len() / FACET_LEN
        )));
    }

    let read_f32 = |at: usize| f32::from_le_bytes([facets[at], facets[at + 1], facets[at + 2], facets[at + 3]]);

    let mut mesh = Mesh::with_capacity(triangle_count * 3, triangle_count);
    for facet in 0..triangle_count {
        // Stored normal (12 bytes) is recomputed from the winding instead
        let mut offset = facet * FACET_LEN + 12;

        let mut corners = [Point3::origin(); 3];
        for corner in &mut corners {
            *corner = Point3::new(read_f32(offset), read_f32(offset + 4), read_f32(offset + 8));
            offset += 12;
        }

        mesh.add_triangle(Triangle::new(corners[0], corners[1], corners[2]));
    }

    Ok(mesh)
}

/// Parse an ASCII STL file
pub fn parse_ascii_stl(input: &str) -> Result<Mesh, LoadError> {
    match parse_ascii_stl_impl(input) {
        Ok((_, mesh)) => Ok(mesh),
        Err(e) => Err(LoadError::Stl(format!("failed to parse ASCII STL: {:?}", e))),
    }
}

fn parse_ascii_stl_impl(input: &str) -> IResult<&str, Mesh> {
    let (input, _) = preceded(multispace0, tag("solid"))(input)?;
    let (input, _) = not_line_ending(input)?; // Optional name
    let (input, triangles) = many0(parse_facet)(input)?;
    let (input, _) = preceded(multispace0, tag("endsolid"))(input)?;

    let mut mesh = Mesh::with_capacity(triangles.len() * 3, triangles.len());
    for triangle in triangles {
        mesh.add_triangle(triangle);
    }

    Ok((input, mesh))
}

fn parse_facet(input: &str) -> IResult<&str, Triangle> {
    let (input, _) = preceded(multispace0, tag("facet"))(input)?;
    let (input, _) = preceded(multispace1, tag("normal"))(input)?;
    let (input, _) = parse_vector3(input)?;
    let (input, _) = preceded(multispace0, tag("outer"))(input)?;
    let (input, _) = preceded(multispace1, tag("loop"))(input)?;
    let (input, v1) = parse_vertex(input)?;
    let (input, v2) = parse_vertex(input)?;
    let (input, v3) = parse_vertex(input)?;
    let (input, _) = preceded(multispace0, tag("endloop"))(input)?;
    let (input, _) = preceded(multispace0, tag("endfacet"))(input)?;

    Ok((input, Triangle::new(v1, v2, v3)))
}

fn parse_vertex(input: &str) -> IResult<&str, Point3<f32>> {
    let (input, _) = preceded(multispace0, tag("vertex"))(input)?;
    let (input, (x, y, z)) = parse_vector3(input)?;
    Ok((input, Point3::new(x, y, z)))
}

fn parse_vector3(input: &str) -> IResult<&str, (f32, f32, f32)> {
    let (input, _) = multispace0(input)?;
    let (input, x) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, y) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, z) = float(input)?;
    Ok((input, (x, y, z)))
}

/// Detect and parse STL file (binary or ASCII)
pub fn parse_stl(data: &[u8]) -> Result<Mesh, LoadError> {
    // Binary files may also start with "solid", so fall through on failure
    if data.starts_with(b"solid") {
        if let Ok(text) = std::str::from_utf8(data) {
            if let Ok(mesh) = parse_ascii_stl(text) {
                return Ok(mesh);
            }
        }
    }

    parse_binary_stl(data)
}
