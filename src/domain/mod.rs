//! Domain layer containing business entities and logic.
//!
//! This module implements the core domain logic following Clean Architecture principles.
//! It defines entities, repository interfaces, and the click pipeline independent of
//! the HTTP layer.
//!
//! # Architecture
//!
//! - [`entities`] - Core business data structures
//! - [`repositories`] - Data access trait definitions
//! - [`click_event`] - Client metadata and click event construction
//! - [`click_buffer`] - Staging list and batch flush
//! - [`click_worker`] - Background job queue and flush timer
//!
//! # Click Processing Flow
//!
//! 1. The resolver finds a live link and dispatches a [`click_worker::BackgroundJob::Capture`]
//! 2. [`click_worker::run_background_worker`] stages it via [`click_buffer::ClickBuffer::capture`]
//! 3. A threshold or the [`click_worker::run_flush_timer`] tick drains the staging list
//! 4. Events are bulk-written through [`repositories::ClickRepository`]

pub mod click_buffer;
pub mod click_event;
pub mod click_worker;
pub mod entities;
pub mod repositories;
