//! Workshop appointment booking and lifecycle.

use crate::core::error::{ServiceError, ServiceResult};
use crate::core::templates::{self, ConfirmationDetails};
use crate::core::traits::{AppointmentService, NewAppointment};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::entities::{Appointment, AppointmentState};
use crate::infrastructure::messaging::Messenger;
use crate::infrastructure::traits::{AppointmentRepository, WorkshopRepository};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Offset, TimeDelta, Utc};
use di::{Ref, injectable};
use log::{info, warn};
use std::collections::BTreeMap;
use uuid::Uuid;

#[injectable(AppointmentService)]
pub struct SchedulingService {
    appointments: Ref<dyn AppointmentRepository>,
    workshops: Ref<dyn WorkshopRepository>,
    messenger: Ref<dyn Messenger>,
    config: Ref<AppConfig>,
}

impl SchedulingService {
    pub fn new(
        appointments: Ref<dyn AppointmentRepository>,
        workshops: Ref<dyn WorkshopRepository>,
        messenger: Ref<dyn Messenger>,
        config: Ref<AppConfig>,
    ) -> Self {
        Self {
            appointments,
            workshops,
            messenger,
            config,
        }
    }

    fn business_offset(&self) -> FixedOffset {
        let minutes = self.config.business_utc_offset_minutes;
        FixedOffset::east_opt(minutes * 60).unwrap_or_else(|| {
            warn!("business UTC offset of {minutes} minutes is out of range, using UTC");
            Utc.fix()
        })
    }

    /// Tells the customer their appointment is confirmed. Failures are logged only.
    async fn notify_confirmed(&self, appointment: &Appointment) {
        let workshop = match self.workshops.get_workshop(appointment.workshop_id).await {
            Ok(Some(workshop)) => workshop,
            Ok(None) => {
                warn!("appointment {} points at a missing workshop", appointment.id);
                return;
            }
            Err(e) => {
                warn!("cannot load workshop for confirmation of {}: {e}", appointment.id);
                return;
            }
        };

        let local_start = appointment.start_time.with_timezone(&self.business_offset());
        let details = ConfirmationDetails {
            customer_name: &appointment.customer_name,
            workshop_name: &workshop.name,
            address: &workshop.address,
            date: local_start.format("%d/%m/%Y").to_string(),
            time: local_start.format("%H:%M").to_string(),
        };

        let sent = match &self.config.messaging.confirmation_template_sid {
            Some(content_sid) => {
                let variables = BTreeMap::from([
                    ("1".to_owned(), details.customer_name.to_owned()),
                    ("2".to_owned(), details.date.clone()),
                    ("3".to_owned(), details.time.clone()),
                    ("4".to_owned(), details.workshop_name.to_owned()),
                ]);
                self.messenger
                    .send_template(&appointment.customer_phone, content_sid, &variables)
                    .await
            }
            None => {
                let text = templates::appointment_confirmation(&details);
                self.messenger
                    .send_text(&appointment.customer_phone, &text)
                    .await
            }
        };

        if let Err(e) = sent {
            warn!("confirmation for appointment {} not delivered: {e}", appointment.id);
        }
    }
}

#[async_trait]
impl AppointmentService for SchedulingService {
    async fn list_appointments(
        &self,
        workshop_id: Option<Uuid>,
        state: Option<AppointmentState>,
    ) -> ServiceResult<Vec<Appointment>> {
        Ok(self.appointments.list_appointments(workshop_id, state).await?)
    }

    async fn get_appointment(&self, id: Uuid) -> ServiceResult<Appointment> {
        self.appointments
            .get_appointment(id)
            .await?
            .ok_or(ServiceError::NotFound("appointment"))
    }

    async fn book_appointment(&self, new: NewAppointment) -> ServiceResult<Appointment> {
        let customer_name = new.customer_name.trim().to_owned();
        let customer_phone = new.customer_phone.trim().to_owned();

        if customer_name.is_empty() || customer_phone.is_empty() {
            return Err(ServiceError::Validation(
                "customer name and phone are required".into(),
            ));
        }
        if new.start_time >= new.end_time {
            return Err(ServiceError::Validation(
                "appointment must start before it ends".into(),
            ));
        }

        let now = Utc::now();
        if new.start_time <= now {
            return Err(ServiceError::Validation(
                "appointment must be in the future".into(),
            ));
        }

        let workshop = self
            .workshops
            .get_workshop(new.workshop_id)
            .await?
            .ok_or(ServiceError::NotFound("workshop"))?;

        let offset = self.business_offset();
        let local_start = new.start_time.with_timezone(&offset).naive_local();
        let local_end = new.end_time.with_timezone(&offset).naive_local();
        if !workshop.opening_hours.covers(local_start, local_end) {
            return Err(ServiceError::Validation(format!(
                "{} is closed at the requested time",
                workshop.name
            )));
        }

        let booked = self
            .appointments
            .create_appointment_if_free(Appointment {
                id: Uuid::new_v4(),
                customer_name,
                customer_phone,
                description: new.description.trim().to_owned(),
                start_time: new.start_time,
                end_time: new.end_time,
                workshop_id: workshop.id,
                state: AppointmentState::Pending,
                created_at: now,
                updated_at: now,
            })
            .await?;
        let Some(appointment) = booked else {
            return Err(ServiceError::Conflict(
                "the requested time overlaps another appointment".into(),
            ));
        };

        info!(
            "appointment {} booked at workshop {} for {}",
            appointment.id, workshop.id, appointment.start_time
        );
        Ok(appointment)
    }

    async fn transition(&self, id: Uuid, next: AppointmentState) -> ServiceResult<Appointment> {
        let current = self.get_appointment(id).await?;
        if !current.state.can_transition_to(next) {
            return Err(ServiceError::InvalidTransition {
                from: current.state,
                to: next,
            });
        }

        let updated = match self
            .appointments
            .set_appointment_state(id, current.state, next, Utc::now())
            .await?
        {
            Some(updated) => updated,
            None => {
                // changed or removed between the read and the write
                let fresh = self.get_appointment(id).await?;
                return Err(ServiceError::InvalidTransition {
                    from: fresh.state,
                    to: next,
                });
            }
        };

        info!("appointment {id} moved from {} to {next}", current.state);
        if next == AppointmentState::Confirmed {
            self.notify_confirmed(&updated).await;
        }

        Ok(updated)
    }

    async fn delete_appointment(&self, id: Uuid) -> ServiceResult<()> {
        if self.appointments.delete_appointment(id).await? {
            info!("appointment {id} deleted");
            Ok(())
        } else {
            Err(ServiceError::NotFound("appointment"))
        }
    }

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> ServiceResult<Vec<Uuid>> {
        let hours = self.config.pending_appointment_ttl_hours;
        let ttl = TimeDelta::try_hours(hours)
            .filter(|ttl| *ttl > TimeDelta::zero())
            .ok_or_else(|| {
                ServiceError::Internal(format!("pending appointment TTL of {hours}h is unusable"))
            })?;
        let pending = self
            .appointments
            .list_appointments(None, Some(AppointmentState::Pending))
            .await?;

        let mut expired = Vec::new();
        for appointment in pending {
            if now - appointment.created_at <= ttl {
                continue;
            }
            let canceled = self
                .appointments
                .set_appointment_state(
                    appointment.id,
                    AppointmentState::Pending,
                    AppointmentState::Canceled,
                    now,
                )
                .await?;
            if canceled.is_some() {
                expired.push(appointment.id);
            }
        }

        info!("expired {} stale pending appointment(s)", expired.len());
        Ok(expired)
    }
}
