//! Built-in mission templates

use tracing::debug;

use crate::domain::{MissionObjective, Priority};

/// A reusable mission objective
#[derive(Debug, Clone)]
pub struct MissionTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    objective_description: &'static str,
    priority: Priority,
    constraints: [&'static str; 3],
}

impl MissionTemplate {
    /// The objective this template plans for
    pub fn objective(&self) -> MissionObjective {
        MissionObjective {
            description: self.objective_description.to_string(),
            priority: self.priority,
            constraints: Some(self.constraints.iter().map(|c| c.to_string()).collect()),
        }
    }
}

pub const TEMPLATES: &[MissionTemplate] = &[
    MissionTemplate {
        id: "survey_grid",
        name: "Grid Survey",
        description: "Systematic grid pattern for area mapping",
        objective_description: "Conduct a systematic aerial survey of the specified area using a grid pattern for complete coverage",
        priority: Priority::Medium,
        constraints: [
            "Maintain constant altitude",
            "Overlap images by 70%",
            "Complete within battery limits",
        ],
    },
    MissionTemplate {
        id: "perimeter_patrol",
        name: "Perimeter Patrol",
        description: "Security patrol around a defined perimeter",
        objective_description: "Patrol the perimeter of the specified area for security monitoring",
        priority: Priority::High,
        constraints: [
            "Maintain visual line of sight",
            "Complete circuit every 15 minutes",
            "Focus cameras outward",
        ],
    },
    MissionTemplate {
        id: "search_pattern",
        name: "Search Pattern",
        description: "Expanding square search pattern",
        objective_description: "Execute an expanding square search pattern to locate target within search area",
        priority: Priority::High,
        constraints: [
            "Start from last known position",
            "Expand search radius systematically",
            "Maintain low altitude for visibility",
        ],
    },
    MissionTemplate {
        id: "infrastructure_inspection",
        name: "Infrastructure Inspection",
        description: "Detailed inspection of infrastructure",
        objective_description: "Conduct detailed visual inspection of infrastructure capturing all angles and potential issues",
        priority: Priority::Medium,
        constraints: [
            "Maintain safe distance from structures",
            "Capture high-resolution imagery",
            "Document GPS coordinates of issues",
        ],
    },
];

/// Look up a template by id
pub fn find_template(id: &str) -> Option<&'static MissionTemplate> {
    debug!(%id, "find_template: called");
    TEMPLATES.iter().find(|t| t.id == id)
}
