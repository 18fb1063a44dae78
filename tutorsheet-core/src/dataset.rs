//! Dataset registry.
//!
//! Every logical dataset maps 1:1 to a named sheet inside a spreadsheet.
//! The mapping is fixed at compile time.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const ACADEMIC_BOOK: &str = "1qN1MJ7kVRbSnsV9-WblGikHmCTzLZOTezmuUBgrZ3-k";
const ATTENDANCE_BOOK: &str = "13oDDldQdcVBg5ai3nS9oGtYuq8ijWsloNRmXK87IHnw";
const PROGRESS_BOOK: &str = "1fZmtYB5nPslds7pjQ6sIDHfVYTf_wg1KeTXbmKeUBMw";
const SCORES_BOOK: &str = "1yb_UoQKe3tgbbTmnfYUFQiNQLe9NGdWsE-fzVLGthmw";
const SESSIONS_BOOK: &str = "1KcsMCeFmGAmwKHFqnIxiUxDmLDpR6YDBZBd8Zbd-s6w";
const TEACHERS_BOOK: &str = "1PQNdVQUJa-YQaWv-KZdIC7WE3VVlRAxpX5XT79NMJos";

/// Logical dataset identifier.
///
/// Serializes as the wire name the script endpoint expects in its `sheet`
/// parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DatasetKey {
    #[serde(rename = "siswa")]
    Students,
    #[serde(rename = "kelompokKelas")]
    ClassGroups,
    #[serde(rename = "presensi")]
    Attendance,
    #[serde(rename = "perkembangan")]
    Progress,
    #[serde(rename = "nilaiUtbk")]
    UtbkScores,
    #[serde(rename = "nilaiTkaSma")]
    TkaSmaScores,
    #[serde(rename = "nilaiTkaSmp")]
    TkaSmpScores,
    #[serde(rename = "nilaiTkaSd")]
    TkaSdScores,
    #[serde(rename = "nilaiTesStandar")]
    StandardTestScores,
    #[serde(rename = "nilaiEvaluasi")]
    EvaluationScores,
    #[serde(rename = "pelayanan")]
    ExtraSessions,
    #[serde(rename = "pengajar")]
    Teachers,
}

/// Backing resource of a dataset: spreadsheet id plus sheet name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetSource {
    pub spreadsheet_id: &'static str,
    pub sheet: &'static str,
}

impl DatasetKey {
    pub const ALL: [DatasetKey; 12] = [
        DatasetKey::Students,
        DatasetKey::ClassGroups,
        DatasetKey::Attendance,
        DatasetKey::Progress,
        DatasetKey::UtbkScores,
        DatasetKey::TkaSmaScores,
        DatasetKey::TkaSmpScores,
        DatasetKey::TkaSdScores,
        DatasetKey::StandardTestScores,
        DatasetKey::EvaluationScores,
        DatasetKey::ExtraSessions,
        DatasetKey::Teachers,
    ];

    /// Name used in the script endpoint's `sheet` parameter.
    pub fn wire_name(&self) -> &'static str {
        match self {
            DatasetKey::Students => "siswa",
            DatasetKey::ClassGroups => "kelompokKelas",
            DatasetKey::Attendance => "presensi",
            DatasetKey::Progress => "perkembangan",
            DatasetKey::UtbkScores => "nilaiUtbk",
            DatasetKey::TkaSmaScores => "nilaiTkaSma",
            DatasetKey::TkaSmpScores => "nilaiTkaSmp",
            DatasetKey::TkaSdScores => "nilaiTkaSd",
            DatasetKey::StandardTestScores => "nilaiTesStandar",
            DatasetKey::EvaluationScores => "nilaiEvaluasi",
            DatasetKey::ExtraSessions => "pelayanan",
            DatasetKey::Teachers => "pengajar",
        }
    }

    /// Spreadsheet and sheet backing this dataset.
    pub fn source(&self) -> DatasetSource {
        let (spreadsheet_id, sheet) = match self {
            DatasetKey::Students => (ACADEMIC_BOOK, "Siswa"),
            DatasetKey::ClassGroups => (ACADEMIC_BOOK, "Kelompok Kelas"),
            DatasetKey::Attendance => (ATTENDANCE_BOOK, "Presensi"),
            DatasetKey::Progress => (PROGRESS_BOOK, "Perkembangan"),
            DatasetKey::UtbkScores => (SCORES_BOOK, "Nilai UTBK"),
            DatasetKey::TkaSmaScores => (SCORES_BOOK, "Nilai TKA SMA"),
            DatasetKey::TkaSmpScores => (SCORES_BOOK, "Nilai TKA SMP"),
            DatasetKey::TkaSdScores => (SCORES_BOOK, "Nilai TKA SD"),
            DatasetKey::StandardTestScores => (SCORES_BOOK, "Nilai Tes Standar"),
            DatasetKey::EvaluationScores => (SCORES_BOOK, "Nilai TES EVALUASI"),
            DatasetKey::ExtraSessions => (SESSIONS_BOOK, "Pelayanan"),
            DatasetKey::Teachers => (TEACHERS_BOOK, "Pengajar"),
        };
        DatasetSource {
            spreadsheet_id,
            sheet,
        }
    }
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for DatasetKey {
    type Err = ValidationError;

    /// Accepts the wire name in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        DatasetKey::ALL
            .iter()
            .copied()
            .find(|key| key.wire_name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ValidationError::UnknownDataset(s.to_string()))
    }
}
