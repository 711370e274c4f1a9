// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Quality rules: threshold checks for the general photo profile and the
// stricter document (OCR) profile.

pub mod messages;
pub mod validator;

pub use validator::{QualityRuleEngine, RuleInput, has_critical_issues, issues_to_messages};
