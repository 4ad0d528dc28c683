use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A profile row from the local fallback store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub profile_type: Option<String>,
    pub analysis_scope: Option<String>,
    pub log_source_name: Option<String>,
    pub log_source_type: Option<String>,
    pub description: Option<String>,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Columns for a locally created profile.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProfile {
    pub id: String,
    pub name: String,
    pub profile_type: Option<String>,
    pub analysis_scope: Option<String>,
    pub log_source_name: Option<String>,
    pub log_source_type: Option<String>,
    pub description: Option<String>,
    pub data: Value,
}

/// Columns written by a local update. `None` clears the column, except
/// `name`, which keeps its current value.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub profile_type: Option<String>,
    pub analysis_scope: Option<String>,
    pub log_source_name: Option<String>,
    pub log_source_type: Option<String>,
    pub description: Option<String>,
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileStatus {
    pub profile_id: String,
    pub status: String,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub priority: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusWithProfileName {
    #[serde(flatten)]
    pub status: ProfileStatus,
    pub profile_name: String,
}

/// Profile basics joined with whatever status row exists.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProfileOverview {
    pub id: String,
    pub name: String,
    pub profile_type: Option<String>,
    pub analysis_scope: Option<String>,
    pub status: Option<String>,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub priority: Option<String>,
}

fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// Body of `PUT /api/profile-status/{id}`.
///
/// `nextRun` distinguishes absent (leave alone) from `null` (clear).
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub next_run: Option<Option<DateTime<Utc>>>,
    pub priority: Option<String>,
}

impl StatusUpdate {
    /// Empty strings count as absent.
    pub fn normalized(self) -> StatusUpdate {
        StatusUpdate {
            status: self.status.filter(|s| !s.is_empty()),
            next_run: self.next_run,
            priority: self.priority.filter(|s| !s.is_empty()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.as_deref().map_or(true, str::is_empty)
            && self.next_run.is_none()
            && self.priority.as_deref().map_or(true, str::is_empty)
    }

    pub fn marks_running(&self) -> bool {
        self.status.as_deref() == Some("running")
    }
}

/// Where a response body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Remote,
    Local,
    Simulated,
}

impl DataSource {
    pub fn as_str(self) -> &'static str {
        match self {
            DataSource::Remote => "remote",
            DataSource::Local => "local",
            DataSource::Simulated => "simulated",
        }
    }
}

/// A result tagged with the store that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Sourced<T> {
    pub source: DataSource,
    pub data: T,
}

impl<T> Sourced<T> {
    pub fn remote(data: T) -> Self {
        Sourced {
            source: DataSource::Remote,
            data,
        }
    }

    pub fn local(data: T) -> Self {
        Sourced {
            source: DataSource::Local,
            data,
        }
    }

    pub fn simulated(data: T) -> Self {
        Sourced {
            source: DataSource::Simulated,
            data,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Sourced<U> {
        Sourced {
            source: self.source,
            data: f(self.data),
        }
    }
}
