use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of input characters kept as the title when extraction fails.
pub const FALLBACK_TITLE_CHARS: usize = 100;
pub const UNSPECIFIED_DEADLINE: &str = "not specified";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    /// Total mapping from a free-form label; anything unrecognised is `Medium`.
    pub fn from_label(label: &str) -> Self {
        Self::parse(label).unwrap_or(Self::Medium)
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    /// Todoist severity, 1 (lowest) to 4 (highest).
    pub fn todoist_value(&self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Urgent => 4,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity for a raw label, defaulting to medium.
pub fn priority_value(label: &str) -> u8 {
    Priority::from_label(label).todoist_value()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    EquipmentPurchase,
    SoftwareSubscription,
    TravelBooking,
    MeetingScheduling,
    DocumentRequest,
    General,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::EquipmentPurchase,
        Category::SoftwareSubscription,
        Category::TravelBooking,
        Category::MeetingScheduling,
        Category::DocumentRequest,
        Category::General,
    ];

    pub fn parse(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|category| category.as_str() == normalized)
    }

    pub fn from_label(label: &str) -> Self {
        Self::parse(label).unwrap_or(Self::General)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EquipmentPurchase => "equipment_purchase",
            Self::SoftwareSubscription => "software_subscription",
            Self::TravelBooking => "travel_booking",
            Self::MeetingScheduling => "meeting_scheduling",
            Self::DocumentRequest => "document_request",
            Self::General => "general",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub title: String,
    pub priority: Priority,
    pub category: Category,
    pub deadline_hint: String,
}

impl TaskRecord {
    /// Deterministic record used when the request cannot be extracted.
    pub fn fallback_for(text: &str) -> Self {
        Self {
            title: text.chars().take(FALLBACK_TITLE_CHARS).collect(),
            priority: Priority::Medium,
            category: Category::General,
            deadline_hint: UNSPECIFIED_DEADLINE.to_owned(),
        }
    }

    /// Knowledge-base query used for enrichment: `"<category> <title>"`.
    pub fn retrieval_query(&self) -> String {
        format!("{} {}", self.category.as_str(), self.title)
    }
}

/// Task as confirmed by the task manager.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedTask {
    pub id: String,
    pub url: String,
    pub content: String,
    pub priority: u8,
}
