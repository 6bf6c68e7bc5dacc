//! Standard simulation events.

// INSTANCE LIFECYCLE EVENTS ///////////////////////////////////////////////////////////////////////

pub mod instance {
    use serde::Serialize;

    #[derive(Serialize, Clone)]
    pub struct CreateInstanceRequest {
        pub instance_id: u32,
    }

    #[derive(Serialize, Clone)]
    pub struct DestroyInstanceRequest {
        pub instance_id: u32,
    }

    #[derive(Serialize, Clone)]
    pub struct InstanceCreated {
        pub instance_id: u32,
        pub success: bool,
    }

    #[derive(Serialize, Clone)]
    pub struct InstanceDestroyed {
        pub instance_id: u32,
        pub success: bool,
    }
}

// JOB EXECUTION EVENTS ////////////////////////////////////////////////////////////////////////////

pub mod job {
    use serde::Serialize;

    use crate::core::job::JobRecord;

    #[derive(Serialize, Clone)]
    pub struct SubmitJob {
        pub job: JobRecord,
        pub instance_id: u32,
    }

    #[derive(Serialize, Clone)]
    pub struct JobCompleted {
        pub job: JobRecord,
        pub instance_id: u32,
        pub actual_size: u64,
        pub start_time: f64,
        pub finish_time: f64,
    }

    #[derive(Serialize, Clone)]
    pub struct JobRejected {
        pub job: JobRecord,
        pub instance_id: u32,
    }
}

// WORKLOAD EVENTS /////////////////////////////////////////////////////////////////////////////////

pub mod workload {
    use serde::Serialize;

    use crate::core::job::JobRecord;

    #[derive(Serialize, Clone)]
    pub struct JobBatch {
        pub jobs: Vec<JobRecord>,
    }

    #[derive(Serialize, Clone)]
    pub struct EndOfWorkload {}

    /// Sent by a workload generator when its source is exhausted.
    #[derive(Serialize, Clone)]
    pub struct WorkloadFinished {}

    #[derive(Serialize, Clone)]
    pub struct GenerateJobs {}
}

// TIMER EVENTS ////////////////////////////////////////////////////////////////////////////////////

pub mod timer {
    use serde::Serialize;

    #[derive(Serialize, Clone)]
    pub struct ScaleOutTick {}

    #[derive(Serialize, Clone)]
    pub struct ScaleInTick {}

    #[derive(Serialize, Clone)]
    pub struct DispatchTick {}
}
