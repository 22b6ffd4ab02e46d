//! Foundation types for GeoVersion.
//!
//! This crate provides the identifier, value, and geometry types shared by
//! every other GeoVersion crate. It has no knowledge of storage or trees.
//!
//! # Key Types
//!
//! - [`ObjectId`] -- 20-byte SHA-1 content identifier, with a distinguished NULL
//! - [`ObjectType`] -- the closed set of revision object kinds
//! - [`Value`] / [`FieldType`] -- typed feature attribute values
//! - [`Geometry`] / [`Coordinate`] -- planar geometries with WKT support
//! - [`Envelope`] -- axis-aligned bounding box used for spatial pruning
//! - [`ProgressListener`] -- cooperative progress and cancellation hook

pub mod envelope;
pub mod error;
pub mod geometry;
pub mod object;
pub mod path;
pub mod progress;
pub mod value;

pub use envelope::Envelope;
pub use error::{TypeError, TypeResult};
pub use geometry::{Coordinate, Geometry};
pub use object::{ObjectId, ObjectType};
pub use progress::{DefaultProgressListener, NullProgressListener, ProgressListener};
pub use value::{FieldType, Value};
