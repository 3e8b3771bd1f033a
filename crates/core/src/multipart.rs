//! Multipart upload tracking and part completeness.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::session::SessionId;
use crate::{MAX_PART_SIZE, MAX_TOTAL_PARTS, MIN_PART_SIZE};

/// Multipart upload status.
///
/// `Initiated` moves to `Uploading` when the first part is recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MultipartStatus {
    /// Provider upload created, no parts confirmed yet.
    Initiated,
    /// At least one part confirmed.
    Uploading,
    /// Provider CompleteMultipartUpload succeeded.
    Completed,
    /// Explicitly aborted.
    Aborted,
    /// Passed the session deadline.
    Expired,
}

impl MultipartStatus {
    /// Check if the upload can still accept parts.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Initiated | Self::Uploading)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Uploading => "uploading",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::Expired => "expired",
        }
    }
}

/// A confirmed part: provider-issued etag for one numbered slice.
/// Immutable once recorded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    /// Part number, 1-based.
    pub part_number: u32,
    /// Provider-issued ETag for the part.
    pub etag: String,
    /// Part size in bytes.
    pub size: u64,
    /// When the part was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl CompletedPart {
    /// Construct a part, validating the value-object invariants.
    pub fn new(
        part_number: u32,
        etag: String,
        size: u64,
        created_at: OffsetDateTime,
    ) -> crate::Result<Self> {
        if part_number == 0 {
            return Err(crate::Error::InvalidPart(
                "part number must be >= 1".to_string(),
            ));
        }
        if etag.is_empty() {
            return Err(crate::Error::InvalidPart("etag must not be empty".to_string()));
        }
        if size == 0 {
            return Err(crate::Error::InvalidPart("size must be > 0".to_string()));
        }
        if size < MIN_PART_SIZE || size > MAX_PART_SIZE {
            return Err(crate::Error::InvalidPart(format!(
                "part size {size} outside [{MIN_PART_SIZE}, {MAX_PART_SIZE}]"
            )));
        }
        Ok(Self {
            part_number,
            etag,
            size,
            created_at,
        })
    }
}

/// Child resource of a multipart session, one-to-one by session id.
///
/// The provider upload id is assigned by the storage-initiation call;
/// it cannot be fabricated locally.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MultipartUpload {
    /// Owning session.
    pub session_id: SessionId,
    /// Provider-assigned upload id.
    pub provider_upload_id: String,
    /// Declared number of parts, 1..=10_000.
    pub total_parts: u32,
    /// Status lifecycle.
    pub status: MultipartStatus,
    /// Parts confirmed so far.
    pub parts: Vec<CompletedPart>,
    /// When the multipart upload was initiated.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl MultipartUpload {
    /// Initiate tracking for a provider multipart upload.
    pub fn initiate(
        session_id: SessionId,
        provider_upload_id: String,
        total_parts: u32,
        now: OffsetDateTime,
    ) -> crate::Result<Self> {
        if provider_upload_id.is_empty() {
            return Err(crate::Error::MissingProviderUploadId);
        }
        if total_parts == 0 || total_parts > MAX_TOTAL_PARTS {
            return Err(crate::Error::InvalidTotalParts {
                total: total_parts,
                max: MAX_TOTAL_PARTS,
            });
        }
        Ok(Self {
            session_id,
            provider_upload_id,
            total_parts,
            status: MultipartStatus::Initiated,
            parts: Vec::new(),
            created_at: now,
        })
    }

    /// Record a confirmed part.
    ///
    /// Resubmitting an already-recorded part number is an error, even
    /// with an identical etag; callers must not replay completed parts.
    pub fn add_part(&mut self, part: CompletedPart) -> crate::Result<()> {
        self.require_active()?;
        if part.part_number > self.total_parts {
            return Err(crate::Error::InvalidPartNumber {
                part: part.part_number,
                total: self.total_parts,
            });
        }
        if self.parts.iter().any(|p| p.part_number == part.part_number) {
            return Err(crate::Error::DuplicatePartNumber(part.part_number));
        }
        self.parts.push(part);
        if self.status == MultipartStatus::Initiated {
            self.status = MultipartStatus::Uploading;
        }
        Ok(())
    }

    /// Whether every declared part has been recorded.
    pub fn is_complete(&self) -> bool {
        self.parts.len() as u32 == self.total_parts
    }

    /// Gate before the provider's CompleteMultipartUpload call.
    pub fn require_complete(&self) -> crate::Result<()> {
        if !self.is_complete() {
            return Err(crate::Error::IncompleteParts {
                missing: self.total_parts - self.parts.len() as u32,
                total: self.total_parts,
            });
        }
        Ok(())
    }

    /// Transition to `Completed` after the provider call succeeded.
    pub fn complete(&mut self, deadline: OffsetDateTime, now: OffsetDateTime) -> crate::Result<()> {
        self.require_active()?;
        if now > deadline {
            return Err(crate::Error::SessionExpired);
        }
        self.require_complete()?;
        self.status = MultipartStatus::Completed;
        Ok(())
    }

    /// Abort the upload. Rejected once completed.
    pub fn abort(&mut self) -> crate::Result<()> {
        if self.status == MultipartStatus::Completed {
            return Err(crate::Error::AlreadyCompleted);
        }
        self.status = MultipartStatus::Aborted;
        Ok(())
    }

    /// Mark expired. No-op when completed or aborted.
    pub fn expire(&mut self) {
        if self.status.is_active() {
            self.status = MultipartStatus::Expired;
        }
    }

    /// Parts sorted by part number, the order the provider expects.
    pub fn sorted_parts(&self) -> Vec<CompletedPart> {
        let mut parts = self.parts.clone();
        parts.sort_by_key(|p| p.part_number);
        parts
    }

    fn require_active(&self) -> crate::Result<()> {
        match self.status {
            MultipartStatus::Initiated | MultipartStatus::Uploading => Ok(()),
            MultipartStatus::Completed => Err(crate::Error::AlreadyCompleted),
            MultipartStatus::Aborted => Err(crate::Error::MultipartAborted),
            MultipartStatus::Expired => Err(crate::Error::SessionExpired),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_part(part_number: u32) -> CompletedPart {
        CompletedPart::new(
            part_number,
            format!("etag-{part_number}"),
            MIN_PART_SIZE,
            OffsetDateTime::now_utc(),
        )
        .unwrap()
    }

    fn sample_multipart(total_parts: u32) -> MultipartUpload {
        MultipartUpload::initiate(
            SessionId::new(),
            "provider-upload-1".to_string(),
            total_parts,
            OffsetDateTime::now_utc(),
        )
        .unwrap()
    }

    #[test]
    fn test_initiate_requires_provider_id() {
        let err = MultipartUpload::initiate(
            SessionId::new(),
            String::new(),
            3,
            OffsetDateTime::now_utc(),
        )
        .unwrap_err();
        assert!(matches!(err, crate::Error::MissingProviderUploadId));
    }

    #[test]
    fn test_initiate_bounds_total_parts() {
        assert!(matches!(
            MultipartUpload::initiate(
                SessionId::new(),
                "id".to_string(),
                0,
                OffsetDateTime::now_utc()
            ),
            Err(crate::Error::InvalidTotalParts { .. })
        ));
        assert!(matches!(
            MultipartUpload::initiate(
                SessionId::new(),
                "id".to_string(),
                MAX_TOTAL_PARTS + 1,
                OffsetDateTime::now_utc()
            ),
            Err(crate::Error::InvalidTotalParts { .. })
        ));
        assert!(
            MultipartUpload::initiate(
                SessionId::new(),
                "id".to_string(),
                MAX_TOTAL_PARTS,
                OffsetDateTime::now_utc()
            )
            .is_ok()
        );
    }

    #[test]
    fn test_part_value_object_invariants() {
        let now = OffsetDateTime::now_utc();
        assert!(CompletedPart::new(0, "e".to_string(), MIN_PART_SIZE, now).is_err());
        assert!(CompletedPart::new(1, String::new(), MIN_PART_SIZE, now).is_err());
        assert!(CompletedPart::new(1, "e".to_string(), 0, now).is_err());
        assert!(CompletedPart::new(1, "e".to_string(), MIN_PART_SIZE - 1, now).is_err());
        assert!(CompletedPart::new(1, "e".to_string(), MIN_PART_SIZE, now).is_ok());
    }

    #[test]
    fn test_first_part_moves_to_uploading() {
        let mut mp = sample_multipart(3);
        assert_eq!(mp.status, MultipartStatus::Initiated);
        mp.add_part(sample_part(1)).unwrap();
        assert_eq!(mp.status, MultipartStatus::Uploading);
    }

    #[test]
    fn test_add_part_rejects_out_of_range_and_duplicates() {
        let mut mp = sample_multipart(2);
        mp.add_part(sample_part(1)).unwrap();

        assert!(matches!(
            mp.add_part(sample_part(3)),
            Err(crate::Error::InvalidPartNumber { part: 3, total: 2 })
        ));
        assert!(matches!(
            mp.add_part(sample_part(1)),
            Err(crate::Error::DuplicatePartNumber(1))
        ));
    }

    #[test]
    fn test_require_complete_counts_missing() {
        let mut mp = sample_multipart(3);
        mp.add_part(sample_part(1)).unwrap();
        mp.add_part(sample_part(3)).unwrap();

        match mp.require_complete() {
            Err(crate::Error::IncompleteParts { missing, total }) => {
                assert_eq!(missing, 1);
                assert_eq!(total, 3);
            }
            other => panic!("expected IncompleteParts, got {other:?}"),
        }

        mp.add_part(sample_part(2)).unwrap();
        assert!(mp.require_complete().is_ok());
        assert!(mp.is_complete());
    }

    #[test]
    fn test_complete_requires_all_parts_and_deadline() {
        let now = OffsetDateTime::now_utc();
        let later = now + time::Duration::minutes(5);

        let mut mp = sample_multipart(1);
        assert!(matches!(
            mp.complete(later, now),
            Err(crate::Error::IncompleteParts { .. })
        ));

        mp.add_part(sample_part(1)).unwrap();
        assert!(matches!(
            mp.complete(now - time::Duration::seconds(1), now),
            Err(crate::Error::SessionExpired)
        ));
        mp.complete(later, now).unwrap();
        assert_eq!(mp.status, MultipartStatus::Completed);
    }

    #[test]
    fn test_abort_and_expire_guards() {
        let mut mp = sample_multipart(1);
        mp.add_part(sample_part(1)).unwrap();
        let now = OffsetDateTime::now_utc();
        mp.complete(now + time::Duration::minutes(1), now).unwrap();

        assert!(matches!(mp.abort(), Err(crate::Error::AlreadyCompleted)));
        mp.expire();
        assert_eq!(mp.status, MultipartStatus::Completed);

        let mut aborted = sample_multipart(2);
        aborted.abort().unwrap();
        assert!(matches!(
            aborted.add_part(sample_part(1)),
            Err(crate::Error::MultipartAborted)
        ));
        aborted.expire();
        assert_eq!(aborted.status, MultipartStatus::Aborted);
    }

    #[test]
    fn test_sorted_parts_orders_by_number() {
        let mut mp = sample_multipart(3);
        mp.add_part(sample_part(2)).unwrap();
        mp.add_part(sample_part(3)).unwrap();
        mp.add_part(sample_part(1)).unwrap();

        let numbers: Vec<u32> = mp.sorted_parts().iter().map(|p| p.part_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }
}
