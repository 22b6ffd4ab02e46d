//! Text form of a [`Patch`].
//!
//! A patch is a sequence of records separated by blank lines. Records for
//! the feature types come first and hold the text encoding of a feature type
//! object. Every other record starts with a header line of tab-separated
//! fields led by an op code:
//!
//! ```text
//! A	<path>	<feature type id>      followed by the encoded feature
//! R	<path>	<feature type id>      followed by the encoded feature
//! M	<path>	<old type id>	<new type id>   followed by attribute diff lines
//! T	<path>	<old metadata>	<new metadata>  a tree change, no body
//! ```
//!
//! In `T` records a `-` stands for a tree that does not exist on that side.
//! Paths are escaped like any other free text.

use std::collections::HashMap;

use gv_diff::FeatureDiff;
use gv_store::text::{read_object, write_object};
use gv_store::{RevFeatureType, RevObject};
use gv_types::value::{escape_text, unescape_text};
use gv_types::{ObjectId, ObjectType};

use crate::error::{PatchError, PatchResult};
use crate::patch::{AlteredTree, Patch};

const ABSENT: &str = "-";

/// Encode `patch`. Reading the result back yields an equal patch.
pub fn write_patch(patch: &Patch) -> String {
    let mut out = String::new();
    for feature_type in patch.feature_types() {
        out.push_str(&write_object(&RevObject::FeatureType(feature_type.clone())));
        out.push('\n');
    }
    let features = [("A", patch.added_features()), ("R", patch.removed_features())];
    for (code, features) in features {
        for feature in features {
            out.push_str(&format!(
                "{code}\t{}\t{}\n",
                escape_text(&feature.path),
                feature.feature_type.id()
            ));
            out.push_str(&write_object(&RevObject::Feature(feature.feature.clone())));
            out.push('\n');
        }
    }
    for diff in patch.modified_features() {
        out.push_str(&format!(
            "M\t{}\t{}\t{}\n",
            escape_text(diff.path()),
            diff.old_type().id(),
            diff.new_type().id()
        ));
        out.push_str(&diff.as_text());
        out.push('\n');
    }
    for tree in patch.altered_trees() {
        out.push_str(&format!(
            "T\t{}\t{}\t{}\n\n",
            escape_text(&tree.path),
            metadata_text(tree.old_metadata),
            metadata_text(tree.new_metadata)
        ));
    }
    out
}

/// Decode the output of [`write_patch`].
pub fn read_patch(text: &str) -> PatchResult<Patch> {
    let mut patch = Patch::new();
    let mut types: HashMap<ObjectId, RevFeatureType> = HashMap::new();
    let mut record: Vec<&str> = Vec::new();
    for line in text.lines().chain(std::iter::once("")) {
        if !line.is_empty() {
            record.push(line);
            continue;
        }
        if !record.is_empty() {
            read_record(&record, &mut patch, &mut types)?;
            record.clear();
        }
    }
    Ok(patch)
}

fn read_record(
    lines: &[&str],
    patch: &mut Patch,
    types: &mut HashMap<ObjectId, RevFeatureType>,
) -> PatchResult<()> {
    let header: Vec<&str> = lines[0].split('\t').collect();
    let body = lines[1..].join("\n");
    match header.as_slice() {
        [tag] if *tag == ObjectType::FeatureType.name() => {
            match read_object(&lines.join("\n"))? {
                RevObject::FeatureType(ft) => {
                    types.insert(ft.id(), ft.clone());
                    patch.add_feature_type(ft);
                }
                other => {
                    return Err(PatchError::Parse(format!(
                        "expected a feature type, found a {}",
                        other.object_type()
                    )))
                }
            }
        }
        [code @ ("A" | "R"), path, type_id] => {
            let path = path_field(path)?;
            let feature_type = lookup(types, type_id)?;
            let feature = match read_object(&body)? {
                RevObject::Feature(f) => f,
                other => {
                    return Err(PatchError::Parse(format!(
                        "expected a feature at '{path}', found a {}",
                        other.object_type()
                    )))
                }
            };
            if *code == "A" {
                patch.add_added_feature(path, feature, feature_type);
            } else {
                patch.add_removed_feature(path, feature, feature_type);
            }
        }
        ["M", path, old_id, new_id] => {
            let path = path_field(path)?;
            let old_type = lookup(types, old_id)?;
            let new_type = lookup(types, new_id)?;
            patch.add_modified_feature(FeatureDiff::parse(path, &body, old_type, new_type)?);
        }
        ["T", path, old, new] if lines.len() == 1 => {
            patch.add_altered_tree(AlteredTree::new(
                path_field(path)?,
                parse_metadata(old)?,
                parse_metadata(new)?,
            ));
        }
        _ => return Err(PatchError::Parse(format!("unexpected record '{}'", lines[0]))),
    }
    Ok(())
}

fn lookup(types: &HashMap<ObjectId, RevFeatureType>, id: &str) -> PatchResult<RevFeatureType> {
    let id = parse_id(id)?;
    types
        .get(&id)
        .cloned()
        .ok_or_else(|| PatchError::Parse(format!("unknown feature type {id}")))
}

fn path_field(text: &str) -> PatchResult<String> {
    unescape_text(text).ok_or_else(|| PatchError::Parse(format!("invalid path '{text}'")))
}

fn parse_id(text: &str) -> PatchResult<ObjectId> {
    text.parse()
        .map_err(|e| PatchError::Parse(format!("invalid object id '{text}': {e}")))
}

fn metadata_text(metadata: Option<ObjectId>) -> String {
    metadata.map_or_else(|| ABSENT.to_string(), |id| id.to_hex())
}

fn parse_metadata(text: &str) -> PatchResult<Option<ObjectId>> {
    if text == ABSENT {
        Ok(None)
    } else {
        parse_id(text).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gv_store::{PropertyDescriptor, RevFeature};
    use gv_types::{FieldType, Geometry, Value};

    fn roads() -> RevFeatureType {
        RevFeatureType::new(
            "roads",
            vec![
                PropertyDescriptor::new("geom", FieldType::Geometry),
                PropertyDescriptor::new("name", FieldType::String),
            ],
        )
    }

    fn road(name: &str, end: f64) -> RevFeature {
        RevFeature::of([
            Value::Geometry(Geometry::line_string(&[(0.0, 0.0), (end, 1.0)])),
            Value::from(name),
        ])
    }

    fn sample() -> Patch {
        let ft = roads();
        let mut patch = Patch::new();
        patch.add_added_feature("roads/new", road("North\tRoad", 2.0), ft.clone());
        patch.add_removed_feature("roads/old", RevFeature::new(vec![None, Some(Value::from("x"))]), ft.clone());
        patch.add_modified_feature(FeatureDiff::compute(
            "roads/r1",
            &road("a", 1.0),
            &road("b", 3.0),
            &ft,
            &ft,
            false,
        ));
        patch.add_altered_tree(AlteredTree::new("roads", Some(ObjectId::NULL), Some(ft.id())));
        patch.add_altered_tree(AlteredTree::new("gone", Some(ft.id()), None));
        patch
    }

    #[test]
    fn records_are_separated_by_blank_lines() {
        let text = write_patch(&sample());
        assert!(text.starts_with("FEATURETYPE\n"));
        let headers: Vec<&str> = text
            .split("\n\n")
            .filter_map(|r| r.lines().next())
            .map(|l| l.split('\t').next().unwrap_or(""))
            .collect();
        assert_eq!(headers, vec!["FEATURETYPE", "A", "R", "M", "T", "T"]);
        assert!(text.contains("North\\tRoad"));
        assert!(text.contains(&format!("T\tgone\t{}\t-\n", roads().id())));
    }

    #[test]
    fn reads_back_what_it_writes() {
        let patch = sample();
        let text = write_patch(&patch);
        let read = read_patch(&text).unwrap();
        assert_eq!(read, patch);
        assert_eq!(write_patch(&read), text);
    }

    #[test]
    fn tolerates_extra_blank_lines() {
        let text = write_patch(&sample()).replace("\n\n", "\n\n\n");
        assert_eq!(read_patch(&text).unwrap(), sample());
        assert!(read_patch("").unwrap().is_empty());
    }

    #[test]
    fn rejects_unknown_feature_types() {
        let text = format!("A\troads/x\t{}\nFEATURE\nSTRING\tx\n", roads().id());
        assert!(matches!(read_patch(&text), Err(PatchError::Parse(_))));
    }

    #[test]
    fn rejects_unknown_records() {
        assert!(matches!(read_patch("X\ty\n"), Err(PatchError::Parse(_))));
        assert!(matches!(read_patch("T\ta\tb\n"), Err(PatchError::Parse(_))));
    }
}
