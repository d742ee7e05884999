use chrono::Utc;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use super::Store;
use crate::error::AppError;
use crate::models::assignment::{AssignmentStatus, DeliveryAssignment};

#[derive(Debug, Clone)]
pub enum Transition {
    Applied(DeliveryAssignment),
    /// The record was not in the expected status; carries what it was instead.
    Rejected(AssignmentStatus),
}

impl Store {
    pub fn insert_assignment(&self, assignment: DeliveryAssignment) -> DeliveryAssignment {
        self.assignments.insert(assignment.id, assignment.clone());
        assignment
    }

    pub fn assignment(&self, id: Uuid) -> Option<DeliveryAssignment> {
        self.assignments.get(&id).map(|entry| entry.value().clone())
    }

    pub fn revoke_assignment(&self, id: Uuid) -> Option<DeliveryAssignment> {
        self.assignments.remove(&id).map(|(_, assignment)| assignment)
    }

    /// Compare-and-set on the status field, under one entry lock.
    pub fn transition_assignment(
        &self,
        id: Uuid,
        expected: AssignmentStatus,
        apply: impl FnOnce(&mut DeliveryAssignment),
    ) -> Result<Transition, AppError> {
        let mut entry = self
            .assignments
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("assignment {id} not found")))?;

        if entry.status != expected {
            return Ok(Transition::Rejected(entry.status));
        }

        apply(&mut entry);
        entry.updated_at = Utc::now();
        Ok(Transition::Applied(entry.clone()))
    }

    pub fn expire_broadcasts(
        &self,
        except: Uuid,
        in_scope: impl Fn(&DeliveryAssignment) -> bool,
    ) -> Vec<DeliveryAssignment> {
        let now = Utc::now();
        let mut expired = Vec::new();

        for mut entry in self.assignments.iter_mut() {
            let assignment = entry.value_mut();
            if assignment.id == except
                || assignment.status != AssignmentStatus::Broadcasted
                || !in_scope(&*assignment)
            {
                continue;
            }

            assignment.status = AssignmentStatus::Expired;
            assignment.updated_at = now;
            expired.push(assignment.clone());
        }

        expired
    }

    pub fn broadcasts_for_courier(&self, courier_id: Uuid) -> Vec<DeliveryAssignment> {
        let mut open: Vec<DeliveryAssignment> = self
            .assignments
            .iter()
            .filter(|entry| {
                let assignment = entry.value();
                assignment.status == AssignmentStatus::Broadcasted
                    && assignment.is_candidate(courier_id)
            })
            .map(|entry| entry.value().clone())
            .collect();
        open.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        open
    }

    /// On failure returns the assignment the courier already holds.
    pub fn claim_courier(&self, courier_id: Uuid, assignment_id: Uuid) -> Result<(), Uuid> {
        match self.active_by_courier.entry(courier_id) {
            Entry::Occupied(held) => Err(*held.get()),
            Entry::Vacant(slot) => {
                slot.insert(assignment_id);
                Ok(())
            }
        }
    }

    /// Releases the claim only if it still points at `assignment_id`.
    pub fn release_courier(&self, courier_id: Uuid, assignment_id: Uuid) -> bool {
        self.active_by_courier
            .remove_if(&courier_id, |_, held| *held == assignment_id)
            .is_some()
    }

    pub fn active_assignment_for(&self, courier_id: Uuid) -> Option<Uuid> {
        self.active_by_courier
            .get(&courier_id)
            .map(|entry| *entry.value())
    }

    pub fn is_courier_busy(&self, courier_id: Uuid) -> bool {
        self.active_by_courier.contains_key(&courier_id)
    }
}
