use serde::{Deserialize, Serialize};

/// Media type a worker or queue is responsible for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Img,
    Vid,
}

impl MediaKind {
    pub fn queue_dir_name(self) -> &'static str {
        match self {
            MediaKind::Img => "img_queue",
            MediaKind::Vid => "vid_queue",
        }
    }

    /// Role strings eligible to receive jobs of this kind.
    pub fn worker_roles(self) -> [&'static str; 2] {
        match self {
            MediaKind::Img => ["img_worker", "img_lead"],
            MediaKind::Vid => ["vid_worker", "vid_lead"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerRole {
    ImgWorker,
    ImgLead,
    VidWorker,
    VidLead,
}

impl WorkerRole {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerRole::ImgWorker => "img_worker",
            WorkerRole::ImgLead => "img_lead",
            WorkerRole::VidWorker => "vid_worker",
            WorkerRole::VidLead => "vid_lead",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "img_worker" => Some(WorkerRole::ImgWorker),
            "img_lead" => Some(WorkerRole::ImgLead),
            "vid_worker" => Some(WorkerRole::VidWorker),
            "vid_lead" => Some(WorkerRole::VidLead),
            _ => None,
        }
    }

    pub fn kind(self) -> MediaKind {
        match self {
            WorkerRole::ImgWorker | WorkerRole::ImgLead => MediaKind::Img,
            WorkerRole::VidWorker | WorkerRole::VidLead => MediaKind::Vid,
        }
    }

    pub fn is_lead(self) -> bool {
        matches!(self, WorkerRole::ImgLead | WorkerRole::VidLead)
    }

    /// Media kind this role dispatches for, or `None` for plain workers.
    pub fn lead_kind(self) -> Option<MediaKind> {
        self.is_lead().then(|| self.kind())
    }
}
