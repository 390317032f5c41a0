//! # SharePoint Provider
//!
//! Microsoft Graph integration for the mirror: app-only authentication,
//! delta-query change feeds, content downloads, and the QuickXorHash
//! codec SharePoint uses to fingerprint file content.
//!
//! The sync core consumes this crate exclusively through the
//! [`ChangeFeed`] trait, so tests can substitute scripted feeds for the
//! real service.

pub mod auth;
pub mod client;
pub mod error;
pub mod feed;
pub mod quickxorhash;
pub mod types;

pub use auth::GraphAuth;
pub use client::SharePointClient;
pub use error::{Result, SharePointError};
pub use feed::{parse_item, ChangeFeed, Drive, DriveItem};
pub use quickxorhash::QuickXorHash;
