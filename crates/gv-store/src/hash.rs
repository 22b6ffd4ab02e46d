//! Canonical per-object hash funnels.
//!
//! Each funnel starts with the object type value and then feeds every
//! semantically relevant field in a fixed order. The id itself is never fed.

use gv_crypto::ObjectHasher;
use gv_types::{ObjectId, ObjectType};

use crate::commit::{RevCommit, RevPerson};
use crate::feature::{PropertyDescriptor, RevFeature, RevFeatureType};
use crate::node::Node;
use crate::object::{RevObject, RevTag};
use crate::tree::RevTree;

const TREE_REF: u8 = 0;
const TREE_BUCKET: u8 = 1;
const TREE_END: u8 = 2;

/// Recompute the id of any revision object from its content.
pub fn hash_object(object: &RevObject) -> ObjectId {
    match object {
        RevObject::Commit(c) => commit_id(c),
        RevObject::Tree(t) => tree_id(t),
        RevObject::Feature(f) => feature_id(f),
        RevObject::FeatureType(ft) => feature_type_id(ft),
        RevObject::Tag(t) => tag_id(t),
    }
}

fn start(object_type: ObjectType) -> ObjectHasher {
    let mut h = ObjectHasher::new();
    h.put_i32(i32::from(object_type.value()));
    h
}

fn put_person(h: &mut ObjectHasher, person: &RevPerson) {
    h.put_optional_str(person.name.as_deref())
        .put_optional_str(person.email.as_deref())
        .put_i64(person.timestamp)
        .put_i32(person.tz_offset);
}

pub fn commit_id(commit: &RevCommit) -> ObjectId {
    let mut h = start(ObjectType::Commit);
    h.put(&commit.tree_id());
    h.put_len(commit.parent_ids().len());
    for parent in commit.parent_ids() {
        h.put(parent);
    }
    put_person(&mut h, commit.author());
    put_person(&mut h, commit.committer());
    h.put_str(commit.message());
    h.finish()
}

pub fn feature_id(feature: &RevFeature) -> ObjectId {
    let mut h = start(ObjectType::Feature);
    h.put_len(feature.values().len());
    for value in feature.values() {
        h.put(value);
    }
    h.finish()
}

fn put_descriptor(h: &mut ObjectHasher, d: &PropertyDescriptor) {
    h.put_u8(d.binding.tag())
        .put_bool(d.nillable)
        .put_str(&d.name)
        .put_u32(d.min_occurs)
        .put_u32(d.max_occurs)
        .put_optional_str(d.crs.as_deref());
}

pub fn feature_type_id(ft: &RevFeatureType) -> ObjectId {
    let mut h = start(ObjectType::FeatureType);
    h.put_str(ft.name());
    h.put_len(ft.descriptors().len());
    for d in ft.descriptors() {
        put_descriptor(&mut h, d);
    }
    h.finish()
}

pub fn tag_id(tag: &RevTag) -> ObjectId {
    let mut h = start(ObjectType::Tag);
    h.put_str(tag.name());
    h.put(&tag.commit_id());
    h.put_str(tag.message());
    put_person(&mut h, tag.tagger());
    h.finish()
}

fn put_node(h: &mut ObjectHasher, node: &Node) {
    h.put_u8(TREE_REF)
        .put_u8(node.node_type().object_type().value())
        .put_str(node.name())
        .put(&node.object_id())
        .put(&node.metadata_id().unwrap_or(ObjectId::NULL))
        .put(&node.bounds().copied());
}

pub fn tree_id(tree: &RevTree) -> ObjectId {
    let mut h = start(ObjectType::Tree);
    for node in tree.children() {
        put_node(&mut h, node);
    }
    for (index, bucket) in tree.buckets() {
        h.put_u8(TREE_BUCKET).put_u32(*index).put(&bucket.id);
    }
    h.put_u8(TREE_END);
    h.finish()
}
