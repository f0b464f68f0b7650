//! Object Storage Module
//!
//! Everything the executor needs to know about the input object, and nothing more.
//!
//! ## Core Concepts
//! - **Locators**: `cos://<bucket>/<key>` URLs are parsed into an `ObjectUrl`, then resolved
//!   into a sized `DataLocator` by a metadata lookup.
//! - **Metadata**: `ObjectMetadata` abstracts the HEAD request against the store, with an
//!   in-memory and an HTTP implementation.
//! - **Partitioning**: `partition` cuts the object's byte range into ordered, disjoint chunks.

pub mod locator;
pub mod metadata;
pub mod partitioner;
