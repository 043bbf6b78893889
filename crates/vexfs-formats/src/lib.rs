//! File format parsers and builders for Vex packed asset archives
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
//! A pack stores many logical files behind one directory index, optionally
//! split across numbered data parts. This crate decodes that directory into a
//! [`pack::Catalog`] and provides the symmetric [`pack::PackBuilder`].
//!
//! # Example
//!
//! ```
//! use vexfs_formats::pack::{PackBuilder, PackDirectory, Placement};
//!
//! let mut builder = PackBuilder::new(2)?;
//! builder.add_file("models/crate.mdl", b"mesh bytes", 4, Placement::Part(0))?;
//! let built = builder.build()?;
//!
//! let directory = PackDirectory::parse(&built.directory)?;
//! assert!(directory.catalog.contains("models/crate.mdl"));
//! # Ok::<(), vexfs_formats::pack::FormatError>(())
//! ```

#![warn(missing_docs)]

pub mod pack;

pub use pack::{Catalog, CatalogEntry, FormatError, FormatResult, PackDirectory};
