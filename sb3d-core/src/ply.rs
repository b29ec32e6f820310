/// PLY parser for ASCII and binary (little/big endian) encodings
///
/// Only vertex positions and face index lists are read; every other element
/// and property is skipped by its declared type.
use nalgebra::Point3;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_till1},
    character::complete::{line_ending, not_line_ending, space0, space1, u64 as parse_u64},
    combinator::{map, value},
    multi::many0,
    sequence::{preceded, terminated},
    IResult,
};

use crate::error::LoadError;
use crate::geometry::Mesh;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl ScalarType {
    pub fn size(self) -> usize {
        match self {
            ScalarType::I8 | ScalarType::U8 => 1,
            ScalarType::I16 | ScalarType::U16 => 2,
            ScalarType::I32 | ScalarType::U32 | ScalarType::F32 => 4,
            ScalarType::F64 => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Scalar { name: String, ty: ScalarType },
    List { name: String, count: ScalarType, item: ScalarType },
}

impl Property {
    pub fn name(&self) -> &str {
        match self {
            Property::Scalar { name, .. } | Property::List { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub count: usize,
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub encoding: Encoding,
    pub elements: Vec<Element>,
}

enum HeaderLine {
    Format(Encoding),
    Element(String, usize),
    Property(Property),
    Comment,
}

/// Parse a PLY file from raw bytes
pub fn parse_ply(data: &[u8]) -> Result<Mesh, LoadError> {
    let (header, body) = split_header(data)?;
    let header = parse_header(header)?;

    let mut reader = match header.encoding {
        Encoding::Ascii => {
            let text = std::str::from_utf8(body)
                .map_err(|_| LoadError::Ply("ASCII body is not valid UTF-8".to_string()))?;
            BodyReader::Ascii(text.split_ascii_whitespace())
        }
        Encoding::BinaryLittleEndian => BodyReader::Binary {
            data: body,
            offset: 0,
            big_endian: false,
        },
        Encoding::BinaryBigEndian => BodyReader::Binary {
            data: body,
            offset: 0,
            big_endian: true,
        },
    };

    let vertex_count = header
        .elements
        .iter()
        .find(|e| e.name == "vertex")
        .map(|e| e.count)
        .ok_or_else(|| LoadError::Ply("no vertex element".to_string()))?;
    // Declared counts are untrusted; every vertex takes at least a byte of body
    let mut mesh = Mesh::with_capacity(vertex_count.min(body.len()), 0);

    for element in &header.elements {
        match element.name.as_str() {
            "vertex" => read_vertices(element, &mut reader, &mut mesh)?,
            "face" => read_faces(element, &mut reader, &mut mesh)?,
            _ => skip_element(element, &mut reader)?,
        }
    }

    // A point cloud is still a valid file; only dangling indices are not
    if let Some((face, index)) = mesh.indices.iter().enumerate().find_map(|(face, tri)| {
        tri.iter()
            .find(|&&i| i as usize >= mesh.positions.len())
            .map(|&i| (face, i))
    }) {
        return Err(LoadError::Ply(format!(
            "face {} references vertex {} of {}",
            face,
            index,
            mesh.positions.len()
        )));
    }
    Ok(mesh)
}

/// Split raw bytes at the `end_header` line
fn split_header(data: &[u8]) -> Result<(&str, &[u8]), LoadError> {
    const END: &[u8] = b"end_header";

    // Only a line that starts with `end_header` closes the header
    let end = data
        .windows(END.len() + 1)
        .position(|w| w[0] == b'\n' && &w[1..] == END)
        .map(|newline| newline + 1)
        .ok_or_else(|| LoadError::Ply("missing end_header".to_string()))?;

    let mut body_start = end + END.len();
    if data.get(body_start) == Some(&b'\r') {
        body_start += 1;
    }
    if data.get(body_start) == Some(&b'\n') {
        body_start += 1;
    }

    let header = std::str::from_utf8(&data[..end])
        .map_err(|_| LoadError::Ply("header is not valid ASCII".to_string()))?;
    Ok((header, &data[body_start..]))
}

pub fn parse_header(input: &str) -> Result<Header, LoadError> {
    let (rest, lines) = header_lines(input)
        .map_err(|e| LoadError::Ply(format!("malformed header: {:?}", e)))?;
    if !rest.trim().is_empty() {
        let line = rest.lines().next().unwrap_or_default();
        return Err(LoadError::Ply(format!("unrecognised header line: {}", line)));
    }

    let mut encoding = None;
    let mut elements: Vec<Element> = Vec::new();
    for line in lines {
        match line {
            HeaderLine::Format(e) => encoding = Some(e),
            HeaderLine::Element(name, count) => elements.push(Element {
                name,
                count,
                properties: Vec::new(),
            }),
            HeaderLine::Property(property) => elements
                .last_mut()
                .ok_or_else(|| LoadError::Ply("property declared before any element".to_string()))?
                .properties
                .push(property),
            HeaderLine::Comment => {}
        }
    }

    let encoding = encoding.ok_or_else(|| LoadError::Ply("missing format line".to_string()))?;
    Ok(Header { encoding, elements })
}

fn header_lines(input: &str) -> IResult<&str, Vec<HeaderLine>> {
    let (input, _) = terminated(tag("ply"), line_end)(input)?;
    many0(alt((format_line, element_line, property_line, comment_line)))(input)
}

fn line_end(input: &str) -> IResult<&str, &str> {
    preceded(space0, line_ending)(input)
}

fn word(input: &str) -> IResult<&str, &str> {
    take_till1(|c: char| c.is_whitespace())(input)
}

fn format_line(input: &str) -> IResult<&str, HeaderLine> {
    let (input, _) = terminated(tag("format"), space1)(input)?;
    let (input, encoding) = alt((
        value(Encoding::Ascii, tag("ascii")),
        value(Encoding::BinaryLittleEndian, tag("binary_little_endian")),
        value(Encoding::BinaryBigEndian, tag("binary_big_endian")),
    ))(input)?;
    let (input, _) = preceded(space1, tag("1.0"))(input)?;
    let (input, _) = line_end(input)?;
    Ok((input, HeaderLine::Format(encoding)))
}

fn element_line(input: &str) -> IResult<&str, HeaderLine> {
    let (input, _) = terminated(tag("element"), space1)(input)?;
    let (input, name) = terminated(word, space1)(input)?;
    let (input, count) = parse_u64(input)?;
    let (input, _) = line_end(input)?;
    Ok((input, HeaderLine::Element(name.to_string(), count as usize)))
}

fn property_line(input: &str) -> IResult<&str, HeaderLine> {
    let (input, _) = terminated(tag("property"), space1)(input)?;
    let (input, property) = alt((list_property, scalar_property))(input)?;
    let (input, _) = line_end(input)?;
    Ok((input, HeaderLine::Property(property)))
}

fn list_property(input: &str) -> IResult<&str, Property> {
    let (input, _) = terminated(tag("list"), space1)(input)?;
    let (input, count) = terminated(scalar_type, space1)(input)?;
    let (input, item) = terminated(scalar_type, space1)(input)?;
    let (input, name) = word(input)?;
    Ok((
        input,
        Property::List {
            name: name.to_string(),
            count,
            item,
        },
    ))
}

fn scalar_property(input: &str) -> IResult<&str, Property> {
    let (input, ty) = terminated(scalar_type, space1)(input)?;
    map(word, move |name: &str| Property::Scalar {
        name: name.to_string(),
        ty,
    })(input)
}

fn comment_line(input: &str) -> IResult<&str, HeaderLine> {
    let (input, _) = alt((tag("comment"), tag("obj_info")))(input)?;
    let (input, _) = not_line_ending(input)?;
    let (input, _) = line_ending(input)?;
    Ok((input, HeaderLine::Comment))
}

// Longer spellings first so `int` does not swallow `int16`
fn scalar_type(input: &str) -> IResult<&str, ScalarType> {
    alt((
        value(ScalarType::I8, alt((tag("int8"), tag("char")))),
        value(ScalarType::U8, alt((tag("uint8"), tag("uchar")))),
        value(ScalarType::I16, alt((tag("int16"), tag("short")))),
        value(ScalarType::U16, alt((tag("uint16"), tag("ushort")))),
        value(ScalarType::I32, alt((tag("int32"), tag("int")))),
        value(ScalarType::U32, alt((tag("uint32"), tag("uint")))),
        value(ScalarType::F64, alt((tag("float64"), tag("double")))),
        value(ScalarType::F32, alt((tag("float32"), tag("float")))),
    ))(input)
}

enum BodyReader<'a> {
    Ascii(std::str::SplitAsciiWhitespace<'a>),
    Binary {
        data: &'a [u8],
        offset: usize,
        big_endian: bool,
    },
}

impl<'a> BodyReader<'a> {
    fn read(&mut self, ty: ScalarType) -> Result<f64, LoadError> {
        match self {
            BodyReader::Ascii(tokens) => {
                let token = tokens
                    .next()
                    .ok_or_else(|| LoadError::Ply("unexpected end of ASCII body".to_string()))?;
                token
                    .parse::<f64>()
                    .map_err(|_| LoadError::Ply(format!("invalid number '{}'", token)))
            }
            BodyReader::Binary {
                data,
                offset,
                big_endian,
            } => {
                let size = ty.size();
                let bytes = data
                    .get(*offset..*offset + size)
                    .ok_or_else(|| LoadError::Ply("unexpected end of binary body".to_string()))?;
                *offset += size;
                Ok(decode(ty, bytes, *big_endian))
            }
        }
    }

    fn read_index(&mut self, ty: ScalarType) -> Result<u32, LoadError> {
        let raw = self.read(ty)?;
        if raw < 0.0 || raw.fract() != 0.0 || raw > u32::MAX as f64 {
            return Err(LoadError::Ply(format!("invalid vertex index {}", raw)));
        }
        Ok(raw as u32)
    }
}

fn decode(ty: ScalarType, bytes: &[u8], big_endian: bool) -> f64 {
    macro_rules! num {
        ($t:ty, $n:expr) => {{
            let mut buf = [0u8; $n];
            buf.copy_from_slice(bytes);
            if big_endian {
                <$t>::from_be_bytes(buf) as f64
            } else {
                <$t>::from_le_bytes(buf) as f64
            }
        }};
    }

    match ty {
        ScalarType::I8 => num!(i8, 1),
        ScalarType::U8 => num!(u8, 1),
        ScalarType::I16 => num!(i16, 2),
        ScalarType::U16 => num!(u16, 2),
        ScalarType::I32 => num!(i32, 4),
        ScalarType::U32 => num!(u32, 4),
        ScalarType::F32 => num!(f32, 4),
        ScalarType::F64 => num!(f64, 8),
    }
}

fn read_vertices(
    element: &Element,
    reader: &mut BodyReader<'_>,
    mesh: &mut Mesh,
) -> Result<(), LoadError> {
    let slot = |axis: &str| {
        element
            .properties
            .iter()
            .position(|p| matches!(p, Property::Scalar { name, .. } if name == axis))
            .ok_or_else(|| LoadError::Ply(format!("vertex element has no '{}' property", axis)))
    };
    let (ix, iy, iz) = (slot("x")?, slot("y")?, slot("z")?);

    let mut position = [0.0f32; 3];
    for _ in 0..element.count {
        for (i, property) in element.properties.iter().enumerate() {
            match property {
                Property::Scalar { ty, .. } => {
                    let v = reader.read(*ty)? as f32;
                    if i == ix {
                        position[0] = v;
                    } else if i == iy {
                        position[1] = v;
                    } else if i == iz {
                        position[2] = v;
                    }
                }
                Property::List { count, item, .. } => skip_list(reader, *count, *item)?,
            }
        }
        mesh.add_vertex(Point3::new(position[0], position[1], position[2]));
    }

    Ok(())
}

fn read_faces(
    element: &Element,
    reader: &mut BodyReader<'_>,
    mesh: &mut Mesh,
) -> Result<(), LoadError> {
    let slot = element
        .properties
        .iter()
        .position(|p| {
            matches!(p, Property::List { name, .. }
                if name == "vertex_indices" || name == "vertex_index")
        })
        .ok_or_else(|| LoadError::Ply("face element has no vertex_indices list".to_string()))?;

    let mut corners = Vec::with_capacity(4);
    for face in 0..element.count {
        for (i, property) in element.properties.iter().enumerate() {
            match property {
                Property::List { count, item, .. } if i == slot => {
                    let n = reader.read_index(*count)? as usize;
                    corners.clear();
                    for _ in 0..n {
                        corners.push(reader.read_index(*item)?);
                    }
                }
                Property::List { count, item, .. } => skip_list(reader, *count, *item)?,
                Property::Scalar { ty, .. } => {
                    reader.read(*ty)?;
                }
            }
        }

        if corners.len() < 3 {
            return Err(LoadError::Ply(format!(
                "face {} has {} corners",
                face,
                corners.len()
            )));
        }
        // Fan triangulation for polygons
        for k in 1..corners.len() - 1 {
            mesh.add_face(corners[0], corners[k], corners[k + 1]);
        }
    }

    Ok(())
}

fn skip_element(element: &Element, reader: &mut BodyReader<'_>) -> Result<(), LoadError> {
    for _ in 0..element.count {
        for property in &element.properties {
            match property {
                Property::Scalar { ty, .. } => {
                    reader.read(*ty)?;
                }
                Property::List { count, item, .. } => skip_list(reader, *count, *item)?,
            }
        }
    }
    Ok(())
}

fn skip_list(reader: &mut BodyReader<'_>, count: ScalarType, item: ScalarType) -> Result<(), LoadError> {
    let n = reader.read_index(count)?;
    for _ in 0..n {
        reader.read(item)?;
    }
    Ok(())
}
