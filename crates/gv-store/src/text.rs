//! Line-oriented text encoding of revision objects.
//!
//! The first line names the object type; each following line holds one
//! tab-separated field. Free text is escaped so that no field contains a tab
//! or a line break, and no encoded object contains a blank line. The patch
//! format embeds feature and feature-type payloads in this form.

use std::collections::BTreeMap;

use gv_types::value::{
    decode_attribute, encode_attribute, escape_text, unescape_text, NULL_VALUE_MARKER as NULL_MARKER,
};
use gv_types::{Envelope, FieldType, ObjectId, ObjectType};

use crate::commit::{RevCommit, RevPerson};
use crate::error::{StoreError, StoreResult};
use crate::feature::{PropertyDescriptor, RevFeature, RevFeatureType};
use crate::node::{Node, NodeType};
use crate::object::{RevObject, RevTag};
use crate::serialization::SerializationFactory;
use crate::tree::{Bucket, RevTree};

/// Text encoding as a [`SerializationFactory`].
#[derive(Clone, Copy, Debug, Default)]
pub struct TextSerializationFactory;

impl TextSerializationFactory {
    pub fn new() -> Self {
        Self
    }
}

impl SerializationFactory for TextSerializationFactory {
    fn encode(&self, object: &RevObject) -> StoreResult<Vec<u8>> {
        Ok(write_object(object).into_bytes())
    }

    fn decode_unchecked(&self, bytes: &[u8]) -> StoreResult<RevObject> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| StoreError::Serialization(format!("invalid UTF-8: {e}")))?;
        read_object(text)
    }

    fn peek_type(&self, bytes: &[u8]) -> StoreResult<ObjectType> {
        let end = bytes.iter().position(|b| *b == b'\n').unwrap_or(bytes.len());
        let header = std::str::from_utf8(&bytes[..end])
            .map_err(|e| StoreError::Serialization(format!("invalid UTF-8: {e}")))?;
        Ok(header.parse::<ObjectType>()?)
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Encode an object. The result ends with a newline.
pub fn write_object(object: &RevObject) -> String {
    let mut lines = vec![object.object_type().name().to_string()];
    match object {
        RevObject::Commit(c) => {
            lines.push(format!("tree\t{}", c.tree_id()));
            let parents: Vec<String> = c.parent_ids().iter().map(ObjectId::to_hex).collect();
            lines.push(format!("parents\t{}", parents.join(" ")));
            lines.push(format!("author\t{}", person_text(c.author())));
            lines.push(format!("committer\t{}", person_text(c.committer())));
            lines.push(format!("message\t{}", escape_text(c.message())));
        }
        RevObject::Tree(t) => {
            lines.push(format!("size\t{}", t.size()));
            lines.push(format!("numtrees\t{}", t.num_trees()));
            lines.push(format!("childcount\t{}", t.child_count()));
            for node in t.children() {
                lines.push(format!(
                    "REF\t{}\t{}\t{}\t{}\t{}",
                    node.node_type(),
                    escape_text(node.name()),
                    node.object_id(),
                    node.metadata_id().unwrap_or(ObjectId::NULL),
                    bounds_text(node.bounds())
                ));
            }
            for (index, bucket) in t.buckets() {
                lines.push(format!(
                    "BUCKET\t{index}\t{}\t{}",
                    bucket.id,
                    bounds_text(bucket.bounds.as_ref())
                ));
            }
        }
        RevObject::Feature(f) => {
            lines.extend(f.values().iter().map(|v| encode_attribute(v.as_ref())));
        }
        RevObject::FeatureType(ft) => {
            lines.push(format!("name\t{}", escape_text(ft.name())));
            lines.extend(ft.descriptors().iter().map(descriptor_text));
        }
        RevObject::Tag(t) => {
            lines.push(format!("name\t{}", escape_text(t.name())));
            lines.push(format!("commit\t{}", t.commit_id()));
            lines.push(format!("message\t{}", escape_text(t.message())));
            lines.push(format!("tagger\t{}", person_text(t.tagger())));
        }
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn optional_text(s: Option<&str>) -> String {
    s.map(escape_text).unwrap_or_else(|| NULL_MARKER.to_string())
}

fn person_text(p: &RevPerson) -> String {
    format!(
        "{}\t{}\t{}\t{}",
        optional_text(p.name.as_deref()),
        optional_text(p.email.as_deref()),
        p.timestamp,
        p.tz_offset
    )
}

fn bounds_text(bounds: Option<&Envelope>) -> String {
    match bounds {
        Some(e) => format!("{};{};{};{}", e.min_x, e.max_x, e.min_y, e.max_y),
        None => NULL_MARKER.to_string(),
    }
}

fn descriptor_text(d: &PropertyDescriptor) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}",
        escape_text(&d.name),
        d.binding,
        d.nillable,
        d.min_occurs,
        d.max_occurs,
        optional_text(d.crs.as_deref())
    )
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

fn malformed(reason: impl Into<String>) -> StoreError {
    StoreError::Serialization(reason.into())
}

struct Lines<'a> {
    lines: std::iter::Peekable<std::str::Lines<'a>>,
}

impl<'a> Lines<'a> {
    fn next_line(&mut self) -> StoreResult<&'a str> {
        self.lines
            .next()
            .ok_or_else(|| malformed("unexpected end of object text"))
    }

    /// Fields of a `key\tf1\tf2...` line.
    fn field(&mut self, key: &str) -> StoreResult<Vec<&'a str>> {
        let line = self.next_line()?;
        let mut parts = line.split('\t');
        if parts.next() != Some(key) {
            return Err(malformed(format!("expected '{key}' line, found '{line}'")));
        }
        Ok(parts.collect())
    }

    fn single(&mut self, key: &str) -> StoreResult<&'a str> {
        let fields = self.field(key)?;
        match fields.as_slice() {
            [v] => Ok(*v),
            _ => Err(malformed(format!("'{key}' expects one field"))),
        }
    }
}

fn parse_num<T: std::str::FromStr>(text: &str) -> StoreResult<T> {
    text.parse()
        .map_err(|_| malformed(format!("invalid number '{text}'")))
}

fn parse_text(text: &str) -> StoreResult<String> {
    unescape_text(text).ok_or_else(|| malformed(format!("invalid escape in '{text}'")))
}

fn parse_optional_text(text: &str) -> StoreResult<Option<String>> {
    if text == NULL_MARKER {
        Ok(None)
    } else {
        parse_text(text).map(Some)
    }
}

fn parse_person(fields: &[&str]) -> StoreResult<RevPerson> {
    match fields {
        [name, email, timestamp, tz] => Ok(RevPerson {
            name: parse_optional_text(name)?,
            email: parse_optional_text(email)?,
            timestamp: parse_num(timestamp)?,
            tz_offset: parse_num(tz)?,
        }),
        _ => Err(malformed("person expects four fields")),
    }
}

fn parse_bounds(text: &str) -> StoreResult<Option<Envelope>> {
    if text == NULL_MARKER {
        return Ok(None);
    }
    let coords: Vec<f64> = text
        .split(';')
        .map(parse_num::<f64>)
        .collect::<StoreResult<_>>()?;
    match coords.as_slice() {
        [min_x, max_x, min_y, max_y] => Ok(Some(Envelope {
            min_x: *min_x,
            max_x: *max_x,
            min_y: *min_y,
            max_y: *max_y,
        })),
        _ => Err(malformed(format!("invalid bounds '{text}'"))),
    }
}

/// Parse a single property descriptor line.
pub fn parse_descriptor(line: &str) -> StoreResult<PropertyDescriptor> {
    let fields: Vec<&str> = line.split('\t').collect();
    match fields.as_slice() {
        [name, binding, nillable, min, max, crs] => Ok(PropertyDescriptor {
            name: parse_text(name)?,
            binding: binding.parse::<FieldType>()?,
            nillable: parse_num(nillable)?,
            min_occurs: parse_num(min)?,
            max_occurs: parse_num(max)?,
            crs: parse_optional_text(crs)?,
        }),
        _ => Err(malformed(format!("invalid descriptor '{line}'"))),
    }
}

/// Format a single property descriptor line.
pub fn format_descriptor(d: &PropertyDescriptor) -> String {
    descriptor_text(d)
}

/// Decode an object, computing its id from the content.
pub fn read_object(text: &str) -> StoreResult<RevObject> {
    let mut lines = Lines {
        lines: text.lines().peekable(),
    };
    let object_type: ObjectType = lines.next_line()?.parse()?;
    let object = match object_type {
        ObjectType::Commit => {
            let tree_id = lines.single("tree")?.parse()?;
            let parents = lines.single("parents")?;
            let parent_ids = parents
                .split(' ')
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<ObjectId>())
                .collect::<Result<Vec<_>, _>>()?;
            let author = parse_person(&lines.field("author")?)?;
            let committer = parse_person(&lines.field("committer")?)?;
            let message = parse_text(lines.single("message")?)?;
            RevObject::Commit(RevCommit::new(tree_id, parent_ids, author, committer, message))
        }
        ObjectType::Tree => {
            let size = parse_num(lines.single("size")?)?;
            let num_trees = parse_num(lines.single("numtrees")?)?;
            let child_count = parse_num(lines.single("childcount")?)?;
            let mut children = Vec::new();
            let mut buckets = BTreeMap::new();
            for line in lines.lines.by_ref() {
                let fields: Vec<&str> = line.split('\t').collect();
                match fields.as_slice() {
                    ["REF", node_type, name, oid, meta, bounds] => {
                        let node_type = NodeType::from_object_type(node_type.parse::<ObjectType>()?)
                            .ok_or_else(|| malformed(format!("invalid node type '{node_type}'")))?;
                        children.push(Node::create(
                            parse_text(name)?,
                            oid.parse()?,
                            meta.parse()?,
                            node_type,
                            parse_bounds(bounds)?,
                        )?);
                    }
                    ["BUCKET", index, id, bounds] => {
                        buckets.insert(
                            parse_num(index)?,
                            Bucket::new(id.parse()?, parse_bounds(bounds)?),
                        );
                    }
                    _ => return Err(malformed(format!("invalid tree line '{line}'"))),
                }
            }
            RevObject::Tree(RevTree::from_parts(
                size,
                num_trees,
                child_count,
                children,
                buckets,
            )?)
        }
        ObjectType::Feature => {
            let values = lines
                .lines
                .map(decode_attribute)
                .collect::<Result<Vec<_>, _>>()?;
            RevObject::Feature(RevFeature::new(values))
        }
        ObjectType::FeatureType => {
            let name = parse_text(lines.single("name")?)?;
            let descriptors = lines
                .lines
                .map(parse_descriptor)
                .collect::<StoreResult<Vec<_>>>()?;
            RevObject::FeatureType(RevFeatureType::new(name, descriptors))
        }
        ObjectType::Tag => {
            let name = parse_text(lines.single("name")?)?;
            let commit_id = lines.single("commit")?.parse()?;
            let message = parse_text(lines.single("message")?)?;
            let tagger = parse_person(&lines.field("tagger")?)?;
            RevObject::Tag(RevTag::new(name, commit_id, message, tagger))
        }
    };
    Ok(object)
}
