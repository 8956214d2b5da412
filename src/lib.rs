//! Categorized book recommendations served from a Firestore collection.
//!
//! The core is [`live_query::LiveQuery`], which turns a push-style collection
//! listener ([`remote::RemoteCollection`]) into a cancellable stream of
//! [`live_query::QueryEvent`]s. [`books_api`] renders those events over HTTP.

pub mod books_api;
pub mod config;
pub mod domain;
pub mod firestore_client;
pub mod live_query;
pub mod remote;
