//! Bastion Core
//!
//! Resource model and provider seam shared by Bastion providers. A front end
//! hands desired `Resource`s to a `Provider` and receives `State`s back.

pub mod differ;
pub mod provider;
pub mod resource;
