//! Maps the request-handling spine's outcomes onto DIMSE protocol status
//! words, reusing the toolkit's own [`dimse::types::DimseStatus`] rather
//! than inventing a parallel status type.

use dimse::types::DimseStatus;

use super::suboperations::SubOperationCounters;
use crate::error::CoreError;

pub fn status_for_error(error: &CoreError) -> DimseStatus {
    DimseStatus::Failure(error.dicom_status())
}

/// Aggregates sub-operation counters into the final status reported at
/// the end of a C-MOVE/C-GET: success if nothing failed or warned,
/// warning if only warnings occurred, failure otherwise.
pub fn aggregate_status(counters: SubOperationCounters) -> DimseStatus {
    if counters.failed > 0 {
        DimseStatus::Failure(0x0122)
    } else if counters.warnings > 0 {
        DimseStatus::Warning(0xB000)
    } else {
        DimseStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_success_aggregates_to_success() {
        let counters = SubOperationCounters {
            completed: 3,
            failed: 0,
            warnings: 0,
            remaining: 0,
        };
        assert_eq!(aggregate_status(counters), DimseStatus::Success);
    }

    #[test]
    fn any_failure_aggregates_to_failure() {
        let counters = SubOperationCounters {
            completed: 2,
            failed: 1,
            warnings: 0,
            remaining: 0,
        };
        assert_eq!(aggregate_status(counters), DimseStatus::Failure(0x0122));
    }

    #[test]
    fn error_maps_through_the_shared_taxonomy() {
        let status = status_for_error(&CoreError::InexistentItem("x".into()));
        assert_eq!(status, DimseStatus::Failure(0xA700));
    }
}
