//! Schema resolution and type unification for a JSON-Schema to typed-code compiler.
//!
//! Documents go through four passes, each consuming the previous one's output:
//! reference resolution ([`resolve`]), canonical graph construction and
//! combinator classification (`build`, `combinator`), field policy resolution
//! ([`policy`]) and finally a freeze into the read-only [`Ir`] that
//! [`render`] backends consume.
pub mod config;
pub mod error;
pub mod ir;
pub mod loader;
pub mod naming;
pub mod path_de;
pub mod policy;
pub mod render;
pub mod resolve;
pub mod schema;

mod build;
mod combinator;

pub use config::{CompileOptions, ContainerInit, OutputMode, ProjectConfig};
pub use error::{CompileError, Diagnostics};
pub use ir::{Ir, TypeId, TypeNode};
pub use render::{GeneratedFile, RenderError, RenderOptions, Renderer};
pub use resolve::SchemaDocument;

use tracing::{debug, info_span};

/// Compiles `documents` into one frozen type graph.
///
/// Every error found along the way is collected; when there is at least one,
/// no IR is returned.
pub fn compile(documents: &[SchemaDocument], options: &CompileOptions) -> Result<Ir, Diagnostics> {
    let _span = info_span!("compile", documents = documents.len()).entered();
    let resolver = resolve::Resolver::new(documents)?;
    debug!(definitions = resolver.definitions().len(), "references resolved");
    let mut registry = build::build(&resolver, options)?;
    policy::resolve(&mut registry, options);
    let ir = registry.freeze(options.acronyms.clone())?;
    debug!(types = ir.len(), "compiled");
    Ok(ir)
}
