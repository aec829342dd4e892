//! # PDF Tools Telegram Bot
//!
//! A Telegram bot that edits PDFs on request: unlock, remove pages, add or
//! strip banner pages, rename with a personal tag and re-lock. Files can be
//! handled one at a time or queued in batch mode.

pub mod batch;
pub mod bot;
pub mod config;
pub mod db;
pub mod dialogue;
pub mod errors;
pub mod filename;
pub mod guard;
pub mod json_store;
pub mod localization;
pub mod maintenance;
pub mod pages;
pub mod pdf;
pub mod pipeline;
pub mod rate_limit;
pub mod session;
pub mod state;
pub mod storage;
pub mod tasks;
