//! Hierarchical container format.
//!
//! Groups mirror path prefixes and every leaf dataset carries one buffer.
//! All integers are little-endian.
//!
//! ```text
//! file    := magic (8) · version u32 · group
//! group   := 0x01 · name · attrs · child_count u32 · node*
//! dataset := 0x02 · name · attrs · payload_len u64 · payload
//! name    := len u32 · utf-8
//! attrs   := count u32 · (name · kind u8 · value)*
//! value   := kind 0x01: i64 | kind 0x02: count u32 · i64*
//! ```
//!
//! Datasets carry the `dtype` and `shape` attributes, plus `need_grad` and
//! `index` (insertion order) when written by this codec.

use std::io::Write;

use indexmap::IndexMap;

use super::{DecodedParameter, ParameterCodec};
use crate::{
    DataType, ParameterDirectory, ParameterError, TypedBuffer, Variable,
    VariableRef, directory::PATH_SEPARATOR, typed_buffer::size_for_shape,
};

pub const CONTAINER_MAGIC: [u8; 8] = *b"\x89PDH\r\n\x1a\n";
pub const CONTAINER_VERSION: u32 = 1;

const NODE_GROUP: u8 = 1;
const NODE_DATASET: u8 = 2;

const ATTR_INT: u8 = 1;
const ATTR_INT_LIST: u8 = 2;

const ATTR_DTYPE: &str = "dtype";
const ATTR_SHAPE: &str = "shape";
const ATTR_NEED_GRAD: &str = "need_grad";
const ATTR_INDEX: &str = "index";

const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone)]
pub struct ContainerCodec {
    max_payload_bytes: u64,
}

impl Default for ContainerCodec {
    fn default() -> Self {
        Self {
            max_payload_bytes: u64::MAX,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum AttrValue {
    Int(i64),
    IntList(Vec<i64>),
}

// Encoding side: a borrowed tree built from the directory snapshot.

#[derive(Default)]
struct GroupNode<'a> {
    children: IndexMap<&'a str, Node<'a>>,
}

struct DatasetNode<'a> {
    index: usize,
    variable: &'a VariableRef,
}

enum Node<'a> {
    Group(GroupNode<'a>),
    Dataset(DatasetNode<'a>),
}

fn build_tree(
    snapshot: &[(String, VariableRef)]
) -> Result<GroupNode<'_>, ParameterError> {
    let mut root = GroupNode::default();
    for (index, (path, variable)) in snapshot.iter().enumerate() {
        let segments: Vec<&str> = path.split(PATH_SEPARATOR).collect();
        let Some((leaf, parents)) = segments.split_last() else {
            return Err(ParameterError::MalformedPath(path.clone()));
        };

        let mut group = &mut root;
        for segment in parents {
            let node = group
                .children
                .entry(*segment)
                .or_insert_with(|| Node::Group(GroupNode::default()));
            group = match node {
                Node::Group(child) => child,
                Node::Dataset(_) => {
                    return Err(ParameterError::MalformedPath(format!(
                        "{path} (\"{segment}\" is already a dataset)"
                    )));
                },
            };
        }
        if group.children.contains_key(leaf) {
            return Err(ParameterError::MalformedPath(format!(
                "{path} (\"{leaf}\" is already a group)"
            )));
        }
        group.children.insert(
            *leaf,
            Node::Dataset(DatasetNode {
                index,
                variable,
            }),
        );
    }
    Ok(root)
}

fn name_len(name: &str) -> usize {
    4 + name.len()
}

fn attr_len(
    name: &str,
    value: &AttrValue,
) -> usize {
    name_len(name)
        + 1
        + match value {
            AttrValue::Int(_) => 8,
            AttrValue::IntList(values) => 4 + 8 * values.len(),
        }
}

fn dataset_attrs(
    index: usize,
    variable: &Variable,
) -> [(&'static str, AttrValue); 4] {
    let data = variable.data();
    [
        (ATTR_DTYPE, AttrValue::Int(data.data_type().tag())),
        (
            ATTR_SHAPE,
            AttrValue::IntList(data.shape().iter().map(|&dim| dim as i64).collect()),
        ),
        (ATTR_NEED_GRAD, AttrValue::Int(variable.need_grad() as i64)),
        (ATTR_INDEX, AttrValue::Int(index as i64)),
    ]
}

fn node_len(
    name: &str,
    node: &Node<'_>,
) -> usize {
    match node {
        Node::Group(group) => group_len(name, group),
        Node::Dataset(dataset) => {
            let variable = dataset.variable.borrow();
            let attrs: usize = dataset_attrs(dataset.index, &variable)
                .iter()
                .map(|(name, value)| attr_len(name, value))
                .sum();
            1 + name_len(name) + 4 + attrs + 8 + variable.data().size_in_bytes()
        },
    }
}

fn group_len(
    name: &str,
    group: &GroupNode<'_>,
) -> usize {
    let children: usize = group
        .children
        .iter()
        .map(|(name, node)| node_len(name, node))
        .sum();
    1 + name_len(name) + 4 + 4 + children
}

fn write_u32(
    out: &mut dyn Write,
    value: u32,
) -> std::io::Result<()> {
    out.write_all(&value.to_le_bytes())
}

fn write_name(
    out: &mut dyn Write,
    name: &str,
) -> Result<(), ParameterError> {
    let len = u32::try_from(name.len())
        .map_err(|_| ParameterError::MalformedPath(name.to_string()))?;
    write_u32(out, len)?;
    out.write_all(name.as_bytes())?;
    Ok(())
}

fn write_attr(
    out: &mut dyn Write,
    name: &str,
    value: &AttrValue,
) -> Result<(), ParameterError> {
    write_name(out, name)?;
    match value {
        AttrValue::Int(value) => {
            out.write_all(&[ATTR_INT])?;
            out.write_all(&value.to_le_bytes())?;
        },
        AttrValue::IntList(values) => {
            out.write_all(&[ATTR_INT_LIST])?;
            write_u32(out, values.len() as u32)?;
            for value in values {
                out.write_all(&value.to_le_bytes())?;
            }
        },
    }
    Ok(())
}

fn write_node(
    out: &mut dyn Write,
    name: &str,
    node: &Node<'_>,
) -> Result<(), ParameterError> {
    match node {
        Node::Group(group) => write_group(out, name, group),
        Node::Dataset(dataset) => {
            let variable = dataset.variable.borrow();
            let attrs = dataset_attrs(dataset.index, &variable);
            out.write_all(&[NODE_DATASET])?;
            write_name(out, name)?;
            write_u32(out, attrs.len() as u32)?;
            for (name, value) in &attrs {
                write_attr(out, name, value)?;
            }
            let payload = variable.data().as_bytes();
            out.write_all(&(payload.len() as u64).to_le_bytes())?;
            out.write_all(payload)?;
            Ok(())
        },
    }
}

fn write_group(
    out: &mut dyn Write,
    name: &str,
    group: &GroupNode<'_>,
) -> Result<(), ParameterError> {
    out.write_all(&[NODE_GROUP])?;
    write_name(out, name)?;
    write_u32(out, 0)?;
    write_u32(out, group.children.len() as u32)?;
    for (name, node) in &group.children {
        write_node(out, name, node)?;
    }
    Ok(())
}

// Decoding side.

struct ContainerReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ContainerReader<'a> {
    fn take(
        &mut self,
        len: usize,
    ) -> Result<&'a [u8], ParameterError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                ParameterError::corrupt(format!(
                    "container truncated: {len} bytes needed at byte {}, {} available",
                    self.pos,
                    self.data.len().saturating_sub(self.pos)
                ))
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ParameterError> {
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(self.take(N)?);
        Ok(bytes)
    }

    fn read_u8(&mut self) -> Result<u8, ParameterError> {
        Ok(self.read_array::<1>()?[0])
    }

    fn read_u32(&mut self) -> Result<u32, ParameterError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    fn read_u64(&mut self) -> Result<u64, ParameterError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    fn read_i64(&mut self) -> Result<i64, ParameterError> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    fn read_name(&mut self) -> Result<&'a str, ParameterError> {
        let len = self.read_u32()? as usize;
        std::str::from_utf8(self.take(len)?)
            .map_err(|_| ParameterError::corrupt("node name is not UTF-8"))
    }

    fn read_attrs(&mut self) -> Result<Vec<(&'a str, AttrValue)>, ParameterError> {
        let count = self.read_u32()?;
        let mut attrs = Vec::new();
        for _ in 0..count {
            let name = self.read_name()?;
            let value = match self.read_u8()? {
                ATTR_INT => AttrValue::Int(self.read_i64()?),
                ATTR_INT_LIST => {
                    let len = self.read_u32()? as usize;
                    let bytes = self.take(len.checked_mul(8).ok_or_else(|| {
                        ParameterError::corrupt("attribute list overflows")
                    })?)?;
                    AttrValue::IntList(
                        bytes
                            .chunks_exact(8)
                            .map(|chunk| {
                                let mut value = [0u8; 8];
                                value.copy_from_slice(chunk);
                                i64::from_le_bytes(value)
                            })
                            .collect(),
                    )
                },
                kind => {
                    return Err(ParameterError::corrupt(format!(
                        "attribute \"{name}\" has unknown kind {kind}"
                    )));
                },
            };
            attrs.push((name, value));
        }
        Ok(attrs)
    }
}

struct DecodedDataset {
    index: Option<i64>,
    path: String,
    variable: Variable,
}

fn find_attr<'v>(
    attrs: &'v [(&str, AttrValue)],
    name: &str,
) -> Option<&'v AttrValue> {
    attrs
        .iter()
        .find(|(attr_name, _)| *attr_name == name)
        .map(|(_, value)| value)
}

fn validate_segment(name: &str) -> Result<(), ParameterError> {
    if name.is_empty() || name.contains(PATH_SEPARATOR) {
        return Err(ParameterError::corrupt(format!(
            "invalid node name \"{name}\""
        )));
    }
    Ok(())
}

impl ContainerCodec {
    pub fn new(max_payload_bytes: u64) -> Self {
        Self {
            max_payload_bytes,
        }
    }

    fn read_dataset(
        &self,
        reader: &mut ContainerReader<'_>,
        path: String,
    ) -> Result<DecodedDataset, ParameterError> {
        let attrs = reader.read_attrs()?;

        let data_type = match find_attr(&attrs, ATTR_DTYPE) {
            Some(AttrValue::Int(tag)) => DataType::from_tag(*tag)?,
            Some(_) => {
                return Err(ParameterError::corrupt(format!(
                    "\"{path}\": dtype attribute is not an integer"
                )));
            },
            None => {
                return Err(ParameterError::corrupt(format!(
                    "\"{path}\": missing dtype attribute"
                )));
            },
        };
        let shape = match find_attr(&attrs, ATTR_SHAPE) {
            Some(AttrValue::IntList(dims)) => dims
                .iter()
                .map(|&dim| {
                    usize::try_from(dim).map_err(|_| {
                        ParameterError::corrupt(format!(
                            "\"{path}\": invalid dimension {dim}"
                        ))
                    })
                })
                .collect::<Result<Vec<usize>, _>>()?,
            Some(_) => {
                return Err(ParameterError::corrupt(format!(
                    "\"{path}\": shape attribute is not an integer list"
                )));
            },
            None => {
                return Err(ParameterError::corrupt(format!(
                    "\"{path}\": missing shape attribute"
                )));
            },
        };
        let need_grad =
            matches!(find_attr(&attrs, ATTR_NEED_GRAD), Some(AttrValue::Int(v)) if *v != 0);
        let index = match find_attr(&attrs, ATTR_INDEX) {
            Some(AttrValue::Int(index)) => Some(*index),
            _ => None,
        };

        let payload_len = reader.read_u64()?;
        if payload_len > self.max_payload_bytes {
            return Err(ParameterError::corrupt(format!(
                "\"{path}\": payload of {payload_len} bytes exceeds the limit of {} bytes",
                self.max_payload_bytes
            )));
        }
        let expected = size_for_shape(&shape, data_type);
        if expected.map(|size| size as u64) != Some(payload_len) {
            return Err(ParameterError::corrupt(format!(
                "\"{path}\": {data_type} {shape:?} needs {expected:?} bytes, dataset holds {payload_len}"
            )));
        }
        let payload = reader.take(payload_len as usize)?;
        let buffer = TypedBuffer::from_bytes(&shape, data_type, payload.to_vec())?;

        Ok(DecodedDataset {
            index,
            path,
            variable: Variable::new(buffer, need_grad),
        })
    }

    fn read_group_body(
        &self,
        reader: &mut ContainerReader<'_>,
        prefix: &str,
        depth: usize,
        datasets: &mut Vec<DecodedDataset>,
    ) -> Result<(), ParameterError> {
        if depth > MAX_DEPTH {
            return Err(ParameterError::corrupt(format!(
                "groups nested deeper than {MAX_DEPTH} levels"
            )));
        }
        // Group attributes carry no parameter state.
        reader.read_attrs()?;
        let child_count = reader.read_u32()?;
        for _ in 0..child_count {
            let kind = reader.read_u8()?;
            let name = reader.read_name()?;
            validate_segment(name)?;
            let path = if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{prefix}{PATH_SEPARATOR}{name}")
            };
            match kind {
                NODE_GROUP => self.read_group_body(reader, &path, depth + 1, datasets)?,
                NODE_DATASET => datasets.push(self.read_dataset(reader, path)?),
                kind => {
                    return Err(ParameterError::corrupt(format!(
                        "\"{path}\": unknown node kind {kind}"
                    )));
                },
            }
        }
        Ok(())
    }
}

impl ParameterCodec for ContainerCodec {
    fn name(&self) -> &'static str {
        "container"
    }

    fn encoded_size(
        &self,
        directory: &ParameterDirectory,
    ) -> Result<usize, ParameterError> {
        let snapshot = directory.get_parameters();
        let root = build_tree(&snapshot)?;
        Ok(CONTAINER_MAGIC.len() + 4 + group_len("", &root))
    }

    fn encode_to_writer(
        &self,
        directory: &ParameterDirectory,
        out: &mut dyn Write,
    ) -> Result<(), ParameterError> {
        let snapshot = directory.get_parameters();
        let root = build_tree(&snapshot)?;
        log::debug!(
            "Encoding {} parameters into {} top-level container nodes",
            snapshot.len(),
            root.children.len()
        );
        out.write_all(&CONTAINER_MAGIC)?;
        write_u32(out, CONTAINER_VERSION)?;
        write_group(out, "", &root)
    }

    fn decode_entries(
        &self,
        bytes: &[u8],
    ) -> Result<Vec<DecodedParameter>, ParameterError> {
        let mut reader = ContainerReader {
            data: bytes,
            pos: 0,
        };
        if reader.take(CONTAINER_MAGIC.len()).ok() != Some(&CONTAINER_MAGIC[..]) {
            return Err(ParameterError::corrupt("not a parameter container"));
        }
        let version = reader.read_u32()?;
        if version != CONTAINER_VERSION {
            return Err(ParameterError::corrupt(format!(
                "unsupported container version {version}"
            )));
        }
        if reader.read_u8()? != NODE_GROUP {
            return Err(ParameterError::corrupt("root node is not a group"));
        }
        reader.read_name()?;

        let mut datasets = Vec::new();
        self.read_group_body(&mut reader, "", 0, &mut datasets)?;
        if reader.pos != bytes.len() {
            return Err(ParameterError::corrupt(format!(
                "{} trailing bytes after the root group",
                bytes.len() - reader.pos
            )));
        }

        if datasets.iter().all(|dataset| dataset.index.is_some()) {
            datasets.sort_by_key(|dataset| dataset.index);
        }
        let mut seen = std::collections::HashSet::new();
        for dataset in &datasets {
            if !seen.insert(dataset.path.as_str()) {
                return Err(ParameterError::corrupt(format!(
                    "duplicate dataset \"{}\"",
                    dataset.path
                )));
            }
        }
        Ok(datasets
            .into_iter()
            .map(|dataset| (dataset.path, dataset.variable))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use half::f16;

    use super::*;
    use crate::ExtendedFloat;

    fn directory() -> ParameterDirectory {
        let directory = ParameterDirectory::new();
        directory
            .get_or_create(
                "conv1/W",
                TypedBuffer::from_slice(&[2, 2], &[1.0f32, 2.0, 3.0, 4.0]).unwrap().into(),
            )
            .unwrap();
        directory
            .get_or_create("top", Variable::new(TypedBuffer::scalar(7i16), false))
            .unwrap();
        directory
            .get_or_create("conv1/b", TypedBuffer::scalar(f16::from_f32(0.5)).into())
            .unwrap();
        directory
            .get_or_create(
                "block/inner/x",
                TypedBuffer::scalar(ExtendedFloat::from_f64(-1.25)).into(),
            )
            .unwrap();
        directory
    }

    #[test]
    fn test_round_trip_preserves_order() {
        let codec = ContainerCodec::default();
        let source = directory();
        let bytes = codec.encode(&source).unwrap();
        assert_eq!(&bytes[..8], &CONTAINER_MAGIC);
        let decoded = codec.decode(&bytes).unwrap();

        let expected: Vec<String> =
            source.get_parameters().into_iter().map(|(n, _)| n).collect();
        let actual: Vec<String> =
            decoded.get_parameters().into_iter().map(|(n, _)| n).collect();
        assert_eq!(actual, expected);
        for (name, variable) in source.get_parameters() {
            assert_eq!(*decoded.get_parameter(&name).unwrap().borrow(), *variable.borrow());
        }
    }

    #[test]
    fn test_measure_then_fill() {
        let codec = ContainerCodec::default();
        let source = directory();
        let size = codec.encode_to_buffer(&source, None).unwrap();
        let mut buffer = vec![0u8; size + 3];
        assert_eq!(codec.encode_to_buffer(&source, Some(&mut buffer)).unwrap(), size);
        assert_eq!(&buffer[..size], codec.encode(&source).unwrap().as_slice());
        assert_eq!(&buffer[size..], &[0, 0, 0]);
    }

    #[test]
    fn test_empty_directory() {
        let codec = ContainerCodec::default();
        let bytes = codec.encode(&ParameterDirectory::new()).unwrap();
        assert_eq!(bytes.len(), codec.encoded_size(&ParameterDirectory::new()).unwrap());
        assert!(codec.decode(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_dataset_group_conflict() {
        let source = ParameterDirectory::new();
        source.get_or_create("a", TypedBuffer::scalar(1u8).into()).unwrap();
        source.get_or_create("a/b", TypedBuffer::scalar(2u8).into()).unwrap();
        assert!(matches!(
            ContainerCodec::default().encode(&source),
            Err(ParameterError::MalformedPath(_))
        ));
    }

    fn dataset_bytes(
        attrs: &[(&str, AttrValue)],
        payload: &[u8],
    ) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&CONTAINER_MAGIC);
        write_u32(&mut out, CONTAINER_VERSION).unwrap();
        out.push(NODE_GROUP);
        write_name(&mut out, "").unwrap();
        write_u32(&mut out, 0).unwrap();
        write_u32(&mut out, 1).unwrap();
        out.push(NODE_DATASET);
        write_name(&mut out, "w").unwrap();
        write_u32(&mut out, attrs.len() as u32).unwrap();
        for (name, value) in attrs {
            write_attr(&mut out, name, value).unwrap();
        }
        out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn test_missing_attributes() {
        let without_shape = dataset_bytes(&[(ATTR_DTYPE, AttrValue::Int(2))], &[1]);
        assert!(matches!(
            ContainerCodec::default().decode(&without_shape),
            Err(ParameterError::CorruptFormat(message)) if message.contains("shape")
        ));
        let without_dtype = dataset_bytes(&[(ATTR_SHAPE, AttrValue::IntList(vec![1]))], &[1]);
        assert!(matches!(
            ContainerCodec::default().decode(&without_dtype),
            Err(ParameterError::CorruptFormat(message)) if message.contains("dtype")
        ));
    }

    #[test]
    fn test_unknown_dtype() {
        let bytes = dataset_bytes(
            &[
                (ATTR_DTYPE, AttrValue::Int(99)),
                (ATTR_SHAPE, AttrValue::IntList(vec![1])),
            ],
            &[1],
        );
        assert!(matches!(
            ContainerCodec::default().decode(&bytes),
            Err(ParameterError::UnsupportedType(99))
        ));
    }

    #[test]
    fn test_minimal_dataset_defaults() {
        let bytes = dataset_bytes(
            &[
                (ATTR_SHAPE, AttrValue::IntList(vec![2])),
                (ATTR_DTYPE, AttrValue::Int(DataType::U16.tag())),
                ("unit", AttrValue::Int(3)),
            ],
            &[1, 0, 2, 0],
        );
        let decoded = ContainerCodec::default().decode(&bytes).unwrap();
        let variable = decoded.get_parameter("w").unwrap();
        assert!(!variable.borrow().need_grad());
        assert_eq!(variable.borrow().data().to_vec::<u16>().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_rejects_truncation_and_garbage() {
        let codec = ContainerCodec::default();
        let bytes = codec.encode(&directory()).unwrap();
        for len in [0, 4, 12, bytes.len() / 2, bytes.len() - 1] {
            assert!(matches!(
                codec.decode(&bytes[..len]),
                Err(ParameterError::CorruptFormat(_))
            ));
        }
        let mut trailing = bytes.clone();
        trailing.push(0);
        assert!(codec.decode(&trailing).is_err());
    }
}
