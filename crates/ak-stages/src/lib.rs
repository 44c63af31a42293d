//! # ak-stages
//!
//! Built-in stage implementations.
//!
//! | Type tag         | View                        | Component                 |
//! |------------------|-----------------------------|---------------------------|
//! | `identification` | [`IdentificationStageView`] | `ak-stage-identification` |
//! | `redirect`       | [`RedirectStageView`]       | `xak-flow-redirect`       |
//! | `deny`           | [`DenyStageView`]           | `ak-stage-access-denied`  |
//! | `dummy`          | [`DummyStageView`]          | `ak-stage-dummy`          |
//!
//! [`default_registry`] registers all of them.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod deny;
pub mod dummy;
pub mod identification;
pub mod redirect;

use ak_flows::StageRegistry;

pub use deny::DenyStageView;
pub use dummy::DummyStageView;
pub use identification::IdentificationStageView;
pub use redirect::{RedirectStageView, RedirectTarget, URL_SCHEME_FLOW};

/// Creates a registry holding every built-in stage type.
#[must_use]
pub fn default_registry() -> StageRegistry {
    StageRegistry::new()
        .with("identification", IdentificationStageView)
        .with("redirect", RedirectStageView)
        .with("deny", DenyStageView)
        .with("dummy", DummyStageView)
}
