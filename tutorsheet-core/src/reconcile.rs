//! Schema reconciliation.
//!
//! Headers of the same logical column have been renamed several times over
//! the life of the spreadsheets. After every fetch, and on every fetch path,
//! records are passed through [`reconcile`], which copies the value of any
//! known alias under the canonical header(s) the rest of the system reads.
//! The pass is additive: original headers and values are kept.

use crate::dataset::DatasetKey;
use crate::normalize::{compact_key, normalize_key};
use crate::record::{Fields, Record};

/// One logical field and the spellings it has appeared under.
#[derive(Debug, Clone, Copy)]
pub struct FieldAlias {
    /// Headers the found value is written to.
    pub canonical: &'static [&'static str],
    /// Spellings matched by compact-key equality, in priority order.
    pub exact: &'static [&'static str],
    /// Spellings matched when a header's compact key contains theirs.
    pub contains: &'static [&'static str],
}

const TEACHER_ALIASES: &[FieldAlias] = &[
    FieldAlias {
        canonical: &["Pengajar", "Nama Pengajar"],
        exact: &["Pengajar", "Nama Pengajar"],
        contains: &["Pengajar", "Nama Pengajar"],
    },
    FieldAlias {
        canonical: &["Mata Pelajaran"],
        exact: &["Mata Pelajaran", "Mata  Pelajaran"],
        contains: &["Mata Pelajaran"],
    },
];

const STUDENT_ALIASES: &[FieldAlias] = &[
    FieldAlias {
        canonical: &["No.whatsapp siswa", "Tlpn"],
        exact: &[
            "No.whatsapp siswa",
            "No. whatsapp siswa",
            "No Whatsapp Siswa",
            "No Whatsapp",
            "Tlpn",
            "Telepon",
        ],
        contains: &["No whatsapp siswa", "Tlpn", "Telepon"],
    },
    FieldAlias {
        canonical: &["No.whatsapp orang tua"],
        exact: &[
            "No.whatsapp orang tua",
            "No. whatsapp orang tua",
            "No Whatsapp Orang Tua",
            "No Whatsapp Ortu",
        ],
        contains: &["No whatsapp orang tua", "Whatsapp orang tua"],
    },
];

/// Alias table for a dataset. Empty for datasets without header drift.
pub fn aliases_for(key: DatasetKey) -> &'static [FieldAlias] {
    match key {
        DatasetKey::Teachers => TEACHER_ALIASES,
        DatasetKey::Students => STUDENT_ALIASES,
        _ => &[],
    }
}

/// Normalize header spellings and fill canonical fields from known aliases.
pub fn reconcile(key: DatasetKey, records: Vec<Record>) -> Vec<Record> {
    let aliases = CompiledAliases::new(aliases_for(key));
    records
        .into_iter()
        .map(|mut record| {
            record.fields = normalize_fields(record.fields);
            aliases.apply(&mut record.fields);
            record
        })
        .collect()
}

/// Normalized copy of a field map. A key whose spelling changed is kept
/// under its original spelling as well.
pub fn normalize_fields(fields: Fields) -> Fields {
    let mut out = Fields::new();
    for (key, value) in fields {
        let clean = normalize_key(&key);
        if clean != key {
            out.entry(key).or_insert_with(|| value.clone());
        }
        out.insert(clean, value);
    }
    out
}

/// Alias table with compact keys computed once per pass.
struct CompiledAliases {
    fields: Vec<CompiledAlias>,
}

struct CompiledAlias {
    canonical: &'static [&'static str],
    exact: Vec<String>,
    contains: Vec<String>,
}

impl CompiledAliases {
    fn new(aliases: &[FieldAlias]) -> Self {
        let compile = |names: &[&str]| -> Vec<String> {
            names
                .iter()
                .map(|n| compact_key(n))
                .filter(|n| !n.is_empty())
                .collect()
        };
        Self {
            fields: aliases
                .iter()
                .map(|alias| CompiledAlias {
                    canonical: alias.canonical,
                    exact: compile(alias.exact),
                    contains: compile(alias.contains),
                })
                .collect(),
        }
    }

    fn apply(&self, fields: &mut Fields) {
        if self.fields.is_empty() {
            return;
        }
        let columns: Vec<(String, &String)> =
            fields.iter().map(|(k, v)| (compact_key(k), v)).collect();

        let mut found = Vec::new();
        for alias in &self.fields {
            if let Some(value) = alias.lookup(&columns) {
                found.push((alias.canonical, value));
            }
        }
        for (canonical, value) in found {
            for header in canonical {
                fields.insert((*header).to_string(), value.clone());
            }
        }
    }
}

impl CompiledAlias {
    fn lookup(&self, columns: &[(String, &String)]) -> Option<String> {
        let exact = self.exact.iter().find_map(|wanted| {
            columns
                .iter()
                .filter(|column| has_value(column))
                .find(|column| column.0 == *wanted)
        });
        let hit = exact.or_else(|| {
            self.contains.iter().find_map(|wanted| {
                columns
                    .iter()
                    .filter(|column| has_value(column))
                    .find(|column| column.0.contains(wanted.as_str()))
            })
        });
        hit.map(|column| column.1.to_string())
    }
}

fn has_value(column: &(String, &String)) -> bool {
    !column.1.is_empty()
}
