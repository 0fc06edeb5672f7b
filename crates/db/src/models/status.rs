//! Status helper enums mapping to SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` / `*_types` database table.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Resolve a database status ID, `None` for unknown IDs.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some(Self::$variant), )+
                    _ => None,
                }
            }

            /// Seed-data name of this status.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $label, )+
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

define_status_enum! {
    /// Aggregate build job status. There is no job-level failure state: a
    /// job whose tasks all failed is still `Completed`.
    BuildJobStatus {
        Pending = 1 => "pending",
        Running = 2 => "running",
        Completed = 3 => "completed",
        Cancelled = 4 => "cancelled",
    }
}

define_status_enum! {
    /// Per-target build task status.
    BuildTaskStatus {
        Pending = 1 => "pending",
        Running = 2 => "running",
        Completed = 3 => "completed",
        Failed = 4 => "failed",
        Cancelled = 5 => "cancelled",
    }
}

define_status_enum! {
    /// What caused a build job to be requested.
    BuildTriggerType {
        Manual = 1 => "manual",
        Scheduled = 2 => "scheduled",
        Webhook = 3 => "webhook",
    }
}

impl BuildJobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl BuildTaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::str::FromStr for BuildTaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("Unknown task status '{other}'")),
        }
    }
}

impl std::str::FromStr for BuildTriggerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "scheduled" => Ok(Self::Scheduled),
            "webhook" => Ok(Self::Webhook),
            other => Err(format!("Unknown trigger type '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_ids_match_seed_data() {
        assert_eq!(BuildJobStatus::Pending.id(), 1);
        assert_eq!(BuildJobStatus::Running.id(), 2);
        assert_eq!(BuildJobStatus::Completed.id(), 3);
        assert_eq!(BuildJobStatus::Cancelled.id(), 4);
    }

    #[test]
    fn task_status_ids_match_seed_data() {
        assert_eq!(BuildTaskStatus::Pending.id(), 1);
        assert_eq!(BuildTaskStatus::Running.id(), 2);
        assert_eq!(BuildTaskStatus::Completed.id(), 3);
        assert_eq!(BuildTaskStatus::Failed.id(), 4);
        assert_eq!(BuildTaskStatus::Cancelled.id(), 5);
    }

    #[test]
    fn from_id_round_trips_and_rejects_unknown() {
        assert_eq!(BuildTaskStatus::from_id(4), Some(BuildTaskStatus::Failed));
        assert_eq!(BuildJobStatus::from_id(9), None);
    }

    #[test]
    fn status_into_status_id() {
        let id: StatusId = BuildTriggerType::Webhook.into();
        assert_eq!(id, 3);
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("Completed".parse::<BuildTaskStatus>(), Ok(BuildTaskStatus::Completed));
        assert!("done".parse::<BuildTaskStatus>().is_err());
        assert_eq!("webhook".parse::<BuildTriggerType>(), Ok(BuildTriggerType::Webhook));
    }
}
