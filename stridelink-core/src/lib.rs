//! # Stridelink Core
//!
//! Core library for Stridelink delegated-credential management.
//!
//! This crate links a user's identity-provider account to a third-party
//! fitness-activity provider. It provides:
//! - Domain types for accounts, profiles, and delegated credentials
//! - Traits for account storage and identity assertion verification
//! - The token lifecycle manager (expiry detection, transparent refresh)
//! - The authorization code flow controller
//! - The authenticated activity proxy
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stridelink_core::{
//!     provider::ProviderConfig, store::MemoryStore,
//!     token_manager::TokenManager, SubjectId,
//! };
//!
//! let store = Arc::new(MemoryStore::new());
//! let provider = ProviderConfig::strava("client-id", "client-secret");
//! let manager = TokenManager::new(store, provider);
//! let token = manager.get_valid_access_token(&SubjectId::new("u1")).await?;
//! ```

pub mod activities;
pub mod auth_flow;
pub mod identity;
pub mod model;
pub mod provider;
pub mod store;
pub mod token_manager;

// Re-export commonly used types at crate root
pub use model::{Account, DelegatedCredential, Profile, SubjectId};

pub use store::{AccountStore, FileStore, MemoryStore, Secret, StoreError};

pub use identity::{IdentityError, IdentityVerifier, JwtVerifier, VerifiedIdentity};

pub use provider::{ProviderConfig, TokenResponse};

pub use token_manager::{TokenError, TokenManager};

pub use auth_flow::{AuthFlowController, AuthFlowError};

pub use activities::{Activity, ActivityError, ActivityPatch, ActivityProxy, SportType};
