//! Status helper enums mapping to SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data (1-based) in the
//! corresponding `*_statuses` database table.

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Render job lifecycle status.
    ///
    /// Transitions are monotonic and one-directional:
    /// Pending -> Processing -> {Completed | Failed}.
    RenderJobStatus {
        Pending = 1,
        Processing = 2,
        Completed = 3,
        Failed = 4,
    }
}

impl RenderJobStatus {
    /// Whether this status permits no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, RenderJobStatus::Completed | RenderJobStatus::Failed)
    }

    /// The lookup-table name for this status, used in API responses.
    pub fn name(self) -> &'static str {
        match self {
            RenderJobStatus::Pending => "pending",
            RenderJobStatus::Processing => "processing",
            RenderJobStatus::Completed => "completed",
            RenderJobStatus::Failed => "failed",
        }
    }

    /// Map a raw status id back to the enum.
    pub fn from_id(id: StatusId) -> Option<Self> {
        match id {
            1 => Some(RenderJobStatus::Pending),
            2 => Some(RenderJobStatus::Processing),
            3 => Some(RenderJobStatus::Completed),
            4 => Some(RenderJobStatus::Failed),
            _ => None,
        }
    }
}
