//! ============================================================================
//! Persona Module - Offline coaching persona assignment
//! ============================================================================
//! Eight coaching personas, a keyword classifier that picks one for a new
//! task, and the prompt builder used when coaching on that task.
//!
//! ## Usage
//! ```rust,ignore
//! use taskly_core::persona::{classify, get_persona, build_coaching_prompt};
//!
//! let id = classify("Train for marathon", "");
//! let persona = get_persona(id.as_str());
//! let prompt = build_coaching_prompt(id.as_str(), "Train for marathon");
//! ```
//! ============================================================================

mod classifier;
mod types;

pub use classifier::{all_personas, build_coaching_prompt, classify, get_persona, persona, PERSONAS};
pub use types::{Persona, PersonaId, PersonaStamp};
