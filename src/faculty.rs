use crate::ids::{ClassId, SubjectId, TeacherId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Authorization record: `teacher_id` may teach `subject_id` in `class_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FacultyAssignment {
    pub class_id: ClassId,
    pub subject_id: SubjectId,
    pub teacher_id: TeacherId,
}

impl FacultyAssignment {
    pub fn new(
        class_id: impl Into<ClassId>,
        subject_id: impl Into<SubjectId>,
        teacher_id: impl Into<TeacherId>,
    ) -> Self {
        Self {
            class_id: class_id.into(),
            subject_id: subject_id.into(),
            teacher_id: teacher_id.into(),
        }
    }

    pub fn has_blank_field(&self) -> bool {
        self.class_id.is_blank() || self.subject_id.is_blank() || self.teacher_id.is_blank()
    }
}

/// Read-only lookup table of the assignments valid for one academic year.
#[derive(Debug, Clone, Default)]
pub struct FacultyAssignmentMatrix {
    entries: HashSet<FacultyAssignment>,
}

impl FacultyAssignmentMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, assignment: FacultyAssignment) -> bool {
        self.entries.insert(assignment)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_authorized(
        &self,
        class_id: &ClassId,
        subject_id: &SubjectId,
        teacher_id: &TeacherId,
    ) -> bool {
        self.entries.contains(&FacultyAssignment {
            class_id: class_id.clone(),
            subject_id: subject_id.clone(),
            teacher_id: teacher_id.clone(),
        })
    }

    pub fn subjects_for_class(&self, class_id: &ClassId) -> Vec<SubjectId> {
        self.entries
            .iter()
            .filter(|entry| &entry.class_id == class_id)
            .map(|entry| entry.subject_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn teachers_for(&self, class_id: &ClassId, subject_id: &SubjectId) -> Vec<TeacherId> {
        self.entries
            .iter()
            .filter(|entry| &entry.class_id == class_id && &entry.subject_id == subject_id)
            .map(|entry| entry.teacher_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn choices_for_class(&self, class_id: &ClassId) -> FacultyChoices {
        let mut subjects: BTreeMap<SubjectId, Vec<TeacherId>> = BTreeMap::new();
        for subject in self.subjects_for_class(class_id) {
            let teachers = self.teachers_for(class_id, &subject);
            subjects.insert(subject, teachers);
        }
        FacultyChoices {
            class_id: class_id.clone(),
            subjects,
        }
    }

    /// Entries in a stable order, for export.
    pub fn sorted_entries(&self) -> Vec<FacultyAssignment> {
        let mut entries: Vec<FacultyAssignment> = self.entries.iter().cloned().collect();
        entries.sort();
        entries
    }
}

impl FromIterator<FacultyAssignment> for FacultyAssignmentMatrix {
    fn from_iter<T: IntoIterator<Item = FacultyAssignment>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Subject and teacher options an editor may offer for one class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacultyChoices {
    pub class_id: ClassId,
    pub subjects: BTreeMap<SubjectId, Vec<TeacherId>>,
}

impl FacultyChoices {
    pub fn offers_subject(&self, subject_id: &SubjectId) -> bool {
        self.subjects.contains_key(subject_id)
    }

    pub fn teachers_for(&self, subject_id: &SubjectId) -> &[TeacherId] {
        self.subjects
            .get(subject_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn allows(&self, subject_id: &SubjectId, teacher_id: &TeacherId) -> bool {
        self.teachers_for(subject_id).contains(teacher_id)
    }
}
