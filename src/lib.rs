//! Lead Flow - Conversational lead qualification engine
//!
//! Walks website visitors through a graph of dialogue nodes, using an LLM
//! to pick the next node and extract lead fields from free text.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
