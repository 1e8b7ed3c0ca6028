//! Test doubles and a seeded catalog shared by the workflow tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::{Value, json};

use terminal_auth::{StaffProfile, StaffRole};
use terminal_catalog::{
    City, Client, Contractor, CustomField, Department, DiscountKind, Service, ServiceDiscount,
    ServiceType, Store,
};
use terminal_core::{
    CityId, ClientId, ContractorId, CustomFieldId, DepartmentId, DiscountId, OrderId, ServiceId,
    StoreId, UserId,
};
use terminal_orders::OrderStatus;

use super::{AppServices, FieldInput, LineInput, NewOrder, StatusCallback};
use crate::config::AppConfig;
use crate::marketplace::{
    Marketplace, MarketplaceError, MarketplaceResponse, SlotCalendar, SmsSender,
};
use crate::repository::{Repositories, Repository};

/// Marketplace that answers from queued responses, falling back to success.
#[derive(Default)]
pub(crate) struct StubMarketplace {
    publish: Mutex<VecDeque<MarketplaceResponse>>,
    status: Mutex<VecDeque<Result<MarketplaceResponse, String>>>,
    status_calls: Mutex<Vec<(OrderId, OrderStatus)>>,
    tasks: AtomicU64,
}

impl StubMarketplace {
    pub fn push_publish(&self, response: MarketplaceResponse) {
        self.publish.lock().unwrap().push_back(response);
    }

    pub fn push_status(&self, response: Result<MarketplaceResponse, String>) {
        self.status.lock().unwrap().push_back(response);
    }

    pub fn status_calls(&self) -> Vec<(OrderId, OrderStatus)> {
        self.status_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Marketplace for StubMarketplace {
    async fn publish_task(&self, _payload: &Value) -> Result<MarketplaceResponse, MarketplaceError> {
        let queued = self.publish.lock().unwrap().pop_front();
        Ok(queued.unwrap_or_else(|| {
            let id = self.tasks.fetch_add(1, Ordering::SeqCst) + 1000;
            MarketplaceResponse::json(201, json!({ "id": id }))
        }))
    }

    async fn change_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<MarketplaceResponse, MarketplaceError> {
        let queued = self.status.lock().unwrap().pop_front();
        match queued {
            Some(Err(msg)) => Err(MarketplaceError::Transport(msg)),
            Some(Ok(response)) => Ok(response),
            None => {
                self.status_calls.lock().unwrap().push((order_id, status));
                Ok(MarketplaceResponse::json(200, json!({})))
            }
        }
    }

    async fn assign_executor(
        &self,
        _order_id: OrderId,
        _executor_phone: &str,
    ) -> Result<MarketplaceResponse, MarketplaceError> {
        Ok(MarketplaceResponse::json(
            200,
            json!({ "executor_id": 17, "executor_fio": "Ivan Petrov" }),
        ))
    }
}

pub(crate) struct StubSlots {
    available: AtomicBool,
}

impl StubSlots {
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

#[async_trait]
impl SlotCalendar for StubSlots {
    async fn slots_available(
        &self,
        _dates: &[NaiveDate],
        _services: &[ServiceId],
        _city_id: u64,
    ) -> Result<bool, MarketplaceError> {
        Ok(self.available.load(Ordering::SeqCst))
    }
}

#[derive(Default)]
pub(crate) struct RecordingSms {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSms {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SmsSender for RecordingSms {
    async fn send(&self, phone: &str, text: &str) -> Result<(), MarketplaceError> {
        self.sent
            .lock()
            .unwrap()
            .push((phone.to_string(), text.to_string()));
        Ok(())
    }
}

/// One client with a Kazakh and a Russian store, in-memory storage and stub
/// collaborators.
pub(crate) struct Fixture {
    pub services: AppServices,
    pub marketplace: Arc<StubMarketplace>,
    pub slots: Arc<StubSlots>,
    pub sms: Arc<RecordingSms>,
    pub client_id: ClientId,
    pub store_id: StoreId,
    pub foreign_store_id: StoreId,
    pub furniture: DepartmentId,
    pub kitchen: DepartmentId,
    pub logistics: DepartmentId,
    pub assembly: ServiceId,
    pub promo: ServiceId,
    pub delivery: ServiceId,
    pub address_field: CustomFieldId,
    pub fio_field: CustomFieldId,
    pub contractor_id: ContractorId,
}

fn money(v: i64) -> Option<Decimal> {
    Some(Decimal::new(v, 0))
}

impl Fixture {
    pub async fn new() -> Self {
        let repos = Repositories::in_memory();
        let marketplace = Arc::new(StubMarketplace::default());
        let slots = Arc::new(StubSlots {
            available: AtomicBool::new(true),
        });
        let sms = Arc::new(RecordingSms::default());
        let config = AppConfig {
            export_dir: std::env::temp_dir().join(format!("terminal-exports-{}", uuid::Uuid::now_v7())),
            ..AppConfig::default()
        };

        let fx = Self {
            services: AppServices::new(
                repos,
                marketplace.clone(),
                slots.clone(),
                sms.clone(),
                config,
            ),
            marketplace,
            slots,
            sms,
            client_id: ClientId(1),
            store_id: StoreId(10),
            foreign_store_id: StoreId(20),
            furniture: DepartmentId(100),
            kitchen: DepartmentId(101),
            logistics: DepartmentId(200),
            assembly: ServiceId(1),
            promo: ServiceId(2),
            delivery: ServiceId(4),
            address_field: CustomFieldId(1),
            fio_field: CustomFieldId(2),
            contractor_id: ContractorId(3),
        };
        fx.seed().await;
        fx
    }

    async fn seed(&self) {
        let repos = &self.services.repos;
        repos
            .clients
            .upsert(Client {
                id: self.client_id,
                title: "Acme".into(),
                client_type: "retail".into(),
                contractors_percent: money(10),
                own_blank: false,
                logo_url: Some("https://cdn.example/acme.png".into()),
            })
            .await
            .unwrap();

        let almaty = City {
            id: CityId(1),
            title: "Almaty".into(),
            country_code: "kz".into(),
            marketplace_city_id: 77,
        };
        let moscow = City {
            id: CityId(2),
            title: "Moscow".into(),
            country_code: "ru".into(),
            marketplace_city_id: 5,
        };
        for (id, title, city, contractor) in [
            (self.store_id, "Dostyk Plaza", almaty, Some(self.contractor_id)),
            (self.foreign_store_id, "Tverskaya", moscow, None),
        ] {
            repos
                .stores
                .upsert(Store {
                    id,
                    client_id: self.client_id,
                    title: title.into(),
                    city,
                    is_archive: false,
                    contractor_id: contractor,
                })
                .await
                .unwrap();
        }

        for (id, store_id, title) in [
            (self.furniture, self.store_id, "Furniture"),
            (self.kitchen, self.store_id, "Kitchen"),
            (self.logistics, self.foreign_store_id, "Logistics"),
        ] {
            repos
                .departments
                .upsert(Department {
                    id,
                    store_id,
                    title: title.into(),
                })
                .await
                .unwrap();
        }

        let services = [
            Service {
                id: self.assembly,
                store_id: self.store_id,
                title: "Assembly".into(),
                service_type: ServiceType::Primary,
                cost: money(100),
                cost_signedup: money(80),
                unit_name: "pcs".into(),
                department_ids: vec![self.furniture],
                subcategory_titles: vec!["Furniture".into(), "Assembly".into()],
            },
            Service {
                id: self.promo,
                store_id: self.store_id,
                title: "Promo -10%".into(),
                service_type: ServiceType::Discount,
                cost: None,
                cost_signedup: None,
                unit_name: String::new(),
                department_ids: vec![self.furniture],
                subcategory_titles: vec![],
            },
            Service {
                id: ServiceId(3),
                store_id: self.store_id,
                title: "Sink install".into(),
                service_type: ServiceType::Primary,
                cost: money(50),
                cost_signedup: money(40),
                unit_name: "pcs".into(),
                department_ids: vec![self.kitchen],
                subcategory_titles: vec!["Plumbing".into()],
            },
            Service {
                id: self.delivery,
                store_id: self.foreign_store_id,
                title: "Delivery".into(),
                service_type: ServiceType::Primary,
                cost: money(30),
                cost_signedup: money(25),
                unit_name: "trip".into(),
                department_ids: vec![self.logistics],
                subcategory_titles: vec!["Delivery".into()],
            },
        ];
        for s in services {
            repos.services.upsert(s).await.unwrap();
        }
        repos
            .discounts
            .upsert(ServiceDiscount {
                id: DiscountId(1),
                service_id: self.promo,
                kind: DiscountKind::Relative,
                value: Decimal::new(9, 1),
            })
            .await
            .unwrap();

        for c in [
            Contractor {
                id: self.contractor_id,
                title: "Masters LLC".into(),
                is_aggregator: false,
                price_percents: Decimal::new(70, 0),
            },
            Contractor {
                id: ContractorId(4),
                title: "Signedup".into(),
                is_aggregator: true,
                price_percents: Decimal::ZERO,
            },
        ] {
            repos.contractors.upsert(c).await.unwrap();
        }

        for (id, name, label, index, archive) in [
            (self.address_field, "address", "Address", 1, false),
            (self.fio_field, "fio", "Customer name", 2, false),
            (CustomFieldId(3), "legacy", "Legacy", 3, true),
        ] {
            repos
                .custom_fields
                .upsert(CustomField {
                    id,
                    client_id: self.client_id,
                    field_type: "text".into(),
                    field_name: name.into(),
                    label: Some(label.into()),
                    size: None,
                    required: false,
                    archive,
                    index_number: index,
                    show_in_xls: true,
                })
                .await
                .unwrap();
        }
    }

    fn far_dates(now: DateTime<Utc>) -> String {
        (now.date_naive() + Duration::days(90))
            .format("%Y-%m-%d")
            .to_string()
    }

    /// A draft in the Kazakh store, created by the coworker.
    pub async fn place_order(&self, now: DateTime<Utc>) -> OrderId {
        self.place_order_in(self.store_id, now).await
    }

    pub async fn place_order_in(&self, store_id: StoreId, now: DateTime<Utc>) -> OrderId {
        let (profile, services) = if store_id == self.store_id {
            (
                coworker(self),
                vec![
                    LineInput {
                        id: self.assembly,
                        department_id: self.furniture,
                        count: 2.0,
                    },
                    LineInput {
                        id: self.promo,
                        department_id: self.furniture,
                        count: 1.0,
                    },
                ],
            )
        } else {
            (
                admin(),
                vec![LineInput {
                    id: self.delivery,
                    department_id: self.logistics,
                    count: 1.0,
                }],
            )
        };
        let input = NewOrder {
            store_id,
            phone: "8 701 123 45 67".into(),
            send_sms: false,
            dates: Some(Self::far_dates(now)),
            services,
            fields: vec![
                FieldInput {
                    id: self.address_field,
                    value: "Abay 10".into(),
                },
                FieldInput {
                    id: self.fio_field,
                    value: "Aliya K.".into(),
                },
            ],
        };
        self.services.create_order(&profile, input, now).await.unwrap()
    }

    pub async fn publish(&self, id: OrderId, now: DateTime<Utc>) {
        self.services
            .publish_order(&admin(), id, now)
            .await
            .unwrap();
    }

    /// Completion as reported by the marketplace.
    pub async fn complete(&self, id: OrderId, now: DateTime<Utc>) {
        let callback = StatusCallback {
            api_key: self.services.config.terminal_api_key.clone(),
            order_id: id,
            status: "3".into(),
            agreement_link: None,
            executor_images: vec![],
            executor_id: None,
            executor_fio: None,
        };
        self.services.marketplace_callback(callback, now).await.unwrap();
    }
}

fn profile(role: StaffRole, name: &str) -> StaffProfile {
    StaffProfile {
        user_id: UserId::new(),
        full_name: name.into(),
        role,
        client_id: None,
        store_id: None,
        store_ids: vec![],
        department_ids: vec![],
        can_publish_orders: true,
    }
}

pub(crate) fn admin() -> StaffProfile {
    profile(StaffRole::TerminalAdmin, "Operator")
}

pub(crate) fn coworker(fx: &Fixture) -> StaffProfile {
    StaffProfile {
        store_id: Some(fx.store_id),
        department_ids: vec![fx.furniture],
        ..profile(StaffRole::TerminalCoworker, "Aigerim S.")
    }
}

pub(crate) fn consultant(fx: &Fixture) -> StaffProfile {
    StaffProfile {
        client_id: Some(fx.client_id),
        store_id: Some(fx.store_id),
        department_ids: vec![fx.furniture],
        can_publish_orders: false,
        ..profile(StaffRole::Consultant, "Dana T.")
    }
}

pub(crate) fn store_admin(fx: &Fixture) -> StaffProfile {
    StaffProfile {
        client_id: Some(fx.client_id),
        store_id: Some(fx.store_id),
        ..profile(StaffRole::StoreAdmin, "Marat Y.")
    }
}
