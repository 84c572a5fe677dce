use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use super::domain::{
    ApplicationId, Document, DocumentId, Internship, InternshipId, PracticeApplication, StudentId,
};
use super::repository::{PracticeStore, RepositoryError, StoreTransaction};
use super::slots::{claim_slot, SlotReservation};

#[derive(Debug, Default)]
struct PracticeData {
    internships: HashMap<InternshipId, Internship>,
    applications: HashMap<ApplicationId, PracticeApplication>,
    documents: HashMap<DocumentId, Document>,
}

/// Process-local store. One mutex guards the whole dataset, so units of work are fully
/// serialized. Writes go straight to the live maps and are journaled; a unit of work that
/// does not commit has its journal replayed backwards.
#[derive(Default, Clone)]
pub struct InMemoryPracticeStore {
    data: Arc<Mutex<PracticeData>>,
}

impl InMemoryPracticeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PracticeStore for InMemoryPracticeStore {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        E: From<RepositoryError>,
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E>,
    {
        let mut guard = self.data.lock().map_err(|_| {
            E::from(RepositoryError::Unavailable(
                "practice store mutex poisoned".to_string(),
            ))
        })?;

        let mut journal = JournaledTransaction {
            data: &mut *guard,
            undo: Vec::new(),
        };
        let value = work(&mut journal)?;
        journal.commit();
        Ok(value)
    }
}

/// Prior value of a touched key; `None` means the key did not exist.
enum Undo {
    Internship(InternshipId, Option<Internship>),
    Application(ApplicationId, Option<PracticeApplication>),
    Document(DocumentId, Option<Document>),
}

struct JournaledTransaction<'a> {
    data: &'a mut PracticeData,
    undo: Vec<Undo>,
}

impl JournaledTransaction<'_> {
    fn commit(mut self) {
        self.undo.clear();
    }

    fn rollback(&mut self) {
        while let Some(entry) = self.undo.pop() {
            match entry {
                Undo::Internship(id, prior) => restore(&mut self.data.internships, id, prior),
                Undo::Application(id, prior) => restore(&mut self.data.applications, id, prior),
                Undo::Document(id, prior) => restore(&mut self.data.documents, id, prior),
            }
        }
    }
}

// Whatever is still journaled at drop was never committed, including after a panic in `work`.
impl Drop for JournaledTransaction<'_> {
    fn drop(&mut self) {
        self.rollback();
    }
}

fn restore<K: Eq + Hash, V>(map: &mut HashMap<K, V>, key: K, prior: Option<V>) {
    match prior {
        Some(value) => {
            map.insert(key, value);
        }
        None => {
            map.remove(&key);
        }
    }
}

impl StoreTransaction for JournaledTransaction<'_> {
    fn internship(&mut self, id: &InternshipId) -> Result<Option<Internship>, RepositoryError> {
        Ok(self.data.internships.get(id).cloned())
    }

    fn insert_internship(&mut self, internship: Internship) -> Result<(), RepositoryError> {
        if self.data.internships.contains_key(&internship.id) {
            return Err(RepositoryError::Conflict);
        }
        self.undo
            .push(Undo::Internship(internship.id.clone(), None));
        self.data
            .internships
            .insert(internship.id.clone(), internship);
        Ok(())
    }

    fn reserve_slot(&mut self, id: &InternshipId) -> Result<SlotReservation, RepositoryError> {
        let internship = self
            .data
            .internships
            .get_mut(id)
            .ok_or(RepositoryError::NotFound)?;
        let prior = internship.clone();
        let reservation = claim_slot(internship);
        if reservation.is_granted() {
            self.undo.push(Undo::Internship(id.clone(), Some(prior)));
        }
        Ok(reservation)
    }

    fn application(
        &mut self,
        id: &ApplicationId,
    ) -> Result<Option<PracticeApplication>, RepositoryError> {
        Ok(self.data.applications.get(id).cloned())
    }

    fn applications_for_student(
        &mut self,
        student_id: &StudentId,
    ) -> Result<Vec<PracticeApplication>, RepositoryError> {
        let mut owned: Vec<PracticeApplication> = self
            .data
            .applications
            .values()
            .filter(|application| &application.student_id == student_id)
            .cloned()
            .collect();
        owned.sort_by(|left, right| {
            left.created_at
                .cmp(&right.created_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(owned)
    }

    fn insert_application(
        &mut self,
        application: PracticeApplication,
    ) -> Result<(), RepositoryError> {
        if self.data.applications.contains_key(&application.id) {
            return Err(RepositoryError::Conflict);
        }
        self.undo
            .push(Undo::Application(application.id.clone(), None));
        self.data
            .applications
            .insert(application.id.clone(), application);
        Ok(())
    }

    fn update_application(
        &mut self,
        application: PracticeApplication,
    ) -> Result<(), RepositoryError> {
        match self.data.applications.get_mut(&application.id) {
            Some(slot) => {
                let id = application.id.clone();
                let prior = std::mem::replace(slot, application);
                self.undo.push(Undo::Application(id, Some(prior)));
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn delete_application(&mut self, id: &ApplicationId) -> Result<(), RepositoryError> {
        let removed = self
            .data
            .applications
            .remove(id)
            .ok_or(RepositoryError::NotFound)?;
        self.undo.push(Undo::Application(id.clone(), Some(removed)));

        let attached: Vec<DocumentId> = self
            .data
            .documents
            .values()
            .filter(|document| &document.practice_application_id == id)
            .map(|document| document.id.clone())
            .collect();
        for document_id in attached {
            if let Some(document) = self.data.documents.remove(&document_id) {
                self.undo.push(Undo::Document(document_id, Some(document)));
            }
        }
        Ok(())
    }

    fn documents_for_application(
        &mut self,
        id: &ApplicationId,
    ) -> Result<Vec<Document>, RepositoryError> {
        let mut attached: Vec<Document> = self
            .data
            .documents
            .values()
            .filter(|document| &document.practice_application_id == id)
            .cloned()
            .collect();
        attached.sort_by(|left, right| left.id.cmp(&right.id));
        Ok(attached)
    }

    fn document(&mut self, id: &DocumentId) -> Result<Option<Document>, RepositoryError> {
        Ok(self.data.documents.get(id).cloned())
    }

    fn upsert_document(&mut self, document: Document) -> Result<(), RepositoryError> {
        if !self
            .data
            .applications
            .contains_key(&document.practice_application_id)
        {
            return Err(RepositoryError::NotFound);
        }
        let id = document.id.clone();
        let prior = self.data.documents.insert(id.clone(), document);
        self.undo.push(Undo::Document(id, prior));
        Ok(())
    }
}
