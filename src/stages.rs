//! Pipeline stage taxonomy and deepest-stage classification.
//!
//! The six post-meeting stages map 1:1 to the boolean flags on an engaged
//! lead row. Two counting policies exist in the dashboard and both are kept
//! as distinct operations on purpose:
//!
//! - [`deepest_stage`]: a lead's single most-advanced stage ("what is each
//!   lead's current stage"). Used by the campaign and opportunity views so a
//!   lead is never double counted across stages.
//! - [`crate::aggregate::funnel::count_reaching_stage`]: cumulative per-flag
//!   counts ("how many ever reached at least this stage"). Used by the
//!   funnel view.

use crate::truthy::parse_truthy;
use crate::types::EngagedLeadRecord;

/// Post-meeting pipeline stages, shallow to deep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    ShowedUpToDisco,
    Qualified,
    DemoBooked,
    ShowedUpToDemo,
    ProposalSent,
    Closed,
}

/// Fixed stage ordering, shallow to deep.
pub const STAGE_ORDER: [PipelineStage; 6] = [
    PipelineStage::ShowedUpToDisco,
    PipelineStage::Qualified,
    PipelineStage::DemoBooked,
    PipelineStage::ShowedUpToDemo,
    PipelineStage::ProposalSent,
    PipelineStage::Closed,
];

impl PipelineStage {
    /// Display label, matching the funnel stage names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShowedUpToDisco => "Showed Up to Disco",
            Self::Qualified => "Qualified",
            Self::DemoBooked => "Demo Booked",
            Self::ShowedUpToDemo => "Showed Up to Demo",
            Self::ProposalSent => "Proposal Sent",
            Self::Closed => "Closed",
        }
    }

    /// Metric key used by the manual forecast override table.
    pub fn metric_key(&self) -> &'static str {
        match self {
            Self::ShowedUpToDisco => "showed_up_to_disco",
            Self::Qualified => "qualified",
            Self::DemoBooked => "demo_booked",
            Self::ShowedUpToDemo => "showed_up_to_demo",
            Self::ProposalSent => "proposal_sent",
            Self::Closed => "closed",
        }
    }
}

/// Whether a lead's flag for `stage` is set, after truthiness coercion.
pub fn stage_flag(lead: &EngagedLeadRecord, stage: PipelineStage) -> bool {
    let value = match stage {
        PipelineStage::ShowedUpToDisco => &lead.showed_up_to_disco,
        PipelineStage::Qualified => &lead.qualified,
        PipelineStage::DemoBooked => &lead.demo_booked,
        PipelineStage::ShowedUpToDemo => &lead.showed_up_to_demo,
        PipelineStage::ProposalSent => &lead.proposal_sent,
        PipelineStage::Closed => &lead.closed,
    };
    parse_truthy(value)
}

/// The single most-advanced stage whose flag is set, or `None` when no flag
/// is set. Total over any flag combination; flags set inconsistently (a
/// deep flag without its shallower predecessors) still resolve to the
/// deepest set flag.
pub fn deepest_stage(lead: &EngagedLeadRecord) -> Option<PipelineStage> {
    STAGE_ORDER
        .iter()
        .rev()
        .copied()
        .find(|stage| stage_flag(lead, *stage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lead(flags: &[(&str, serde_json::Value)]) -> EngagedLeadRecord {
        let mut row = serde_json::Map::new();
        row.insert("email".into(), json!("jane@acme.com"));
        row.insert("client".into(), json!("acme"));
        for (name, value) in flags {
            row.insert((*name).into(), value.clone());
        }
        serde_json::from_value(serde_json::Value::Object(row)).unwrap()
    }

    #[test]
    fn no_flags_means_no_stage() {
        assert_eq!(deepest_stage(&lead(&[])), None);
    }

    #[test]
    fn single_flag_resolves_to_that_stage() {
        let l = lead(&[("qualified", json!(true))]);
        assert_eq!(deepest_stage(&l), Some(PipelineStage::Qualified));
    }

    #[test]
    fn deepest_flag_wins_over_shallower_ones() {
        let l = lead(&[
            ("showed_up_to_disco", json!(true)),
            ("qualified", json!(1)),
            ("proposal_sent", json!("yes")),
        ]);
        assert_eq!(deepest_stage(&l), Some(PipelineStage::ProposalSent));
    }

    #[test]
    fn tolerates_inconsistent_flag_progression() {
        // Closed set without any earlier flags — still classifies.
        let l = lead(&[("closed", json!("1"))]);
        assert_eq!(deepest_stage(&l), Some(PipelineStage::Closed));
    }

    #[test]
    fn total_over_all_flag_combinations() {
        // Exhaustive over the 64 boolean combinations: always exactly one
        // answer, the deepest set flag.
        let names = [
            "showed_up_to_disco",
            "qualified",
            "demo_booked",
            "showed_up_to_demo",
            "proposal_sent",
            "closed",
        ];
        for mask in 0u32..64 {
            let flags: Vec<(&str, serde_json::Value)> = names
                .iter()
                .enumerate()
                .map(|(i, name)| (*name, json!(mask & (1 << i) != 0)))
                .collect();
            let result = deepest_stage(&lead(&flags));
            if mask == 0 {
                assert_eq!(result, None);
            } else {
                let deepest_idx = (0..6).rev().find(|i| mask & (1 << i) != 0).unwrap();
                assert_eq!(result, Some(STAGE_ORDER[deepest_idx]));
            }
        }
    }

    #[test]
    fn labels_and_metric_keys_line_up_with_order() {
        assert_eq!(STAGE_ORDER[0].as_str(), "Showed Up to Disco");
        assert_eq!(STAGE_ORDER[5].as_str(), "Closed");
        assert_eq!(STAGE_ORDER[2].metric_key(), "demo_booked");
    }
}
