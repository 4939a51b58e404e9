// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Session Auth - Clerk request authentication
//!
//! Resolves an inbound HTTP request to signed in, signed out, or handshake
//! from its bearer token, session cookies and URL, verifying Clerk session
//! tokens against a static key or the instance's JWKS.
//!
//! ## Modules
//!
//! - `auth` - Token verification, key resolution and request state resolution
//! - `api` - Diagnostic HTTP endpoints (Axum)
//! - `config` - Environment configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod state;
