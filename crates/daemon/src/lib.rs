// SPDX-License-Identifier: MIT

//! dnd-daemon library crate.
//!
//! The daemon itself is a single binary (`dnd-visualizerd`); this library
//! target exists only because the workspace's crate layout expects one
//! per member. Nothing is published from it yet — add client-facing types
//! here if a companion CLI is ever split out.
