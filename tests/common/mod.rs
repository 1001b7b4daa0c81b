#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal_macros::dec;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use votehub::application::payments::PaymentService;
use votehub::application::settlement::SettlementEngine;
use votehub::application::ussd::{UssdRequest, UssdService};
use votehub::domain::catalog::{Category, Event, Nominee};
use votehub::domain::gateway::{InitiatePayment, Initiation, Verification};
use votehub::domain::money::Money;
use votehub::domain::ports::{PaymentGateway, SharedPaymentGateway};
use votehub::error::GatewayError;
use votehub::infrastructure::Stores;

pub const PHONE: &str = "233541234567";
pub const EMAIL_DOMAIN: &str = "allvotesgh.com";
pub const CALLBACK_URL: &str = "http://localhost/voting-system/payment/verify";

#[derive(Default)]
struct Script {
    queued_references: VecDeque<String>,
    issued: u32,
    initiations: Vec<InitiatePayment>,
    verify_calls: usize,
    paid: HashSet<String>,
    fail_initiate: bool,
    fail_verify: bool,
    initiate_delay: Option<Duration>,
}

/// Gateway double: hands out references, records requests and reports a
/// reference as paid once the test says so.
#[derive(Clone, Default)]
pub struct ScriptedGateway {
    script: Arc<Mutex<Script>>,
}

impl ScriptedGateway {
    pub fn queue_reference(&self, reference: &str) {
        self.script
            .lock()
            .unwrap()
            .queued_references
            .push_back(reference.to_string());
    }

    pub fn mark_paid(&self, reference: &str) {
        self.script.lock().unwrap().paid.insert(reference.to_string());
    }

    pub fn fail_initiations(&self, fail: bool) {
        self.script.lock().unwrap().fail_initiate = fail;
    }

    /// Makes `initiate` yield for `delay` before answering, like a real
    /// network call would.
    pub fn delay_initiations(&self, delay: Duration) {
        self.script.lock().unwrap().initiate_delay = Some(delay);
    }

    pub fn fail_verifications(&self, fail: bool) {
        self.script.lock().unwrap().fail_verify = fail;
    }

    pub fn initiations(&self) -> Vec<InitiatePayment> {
        self.script.lock().unwrap().initiations.clone()
    }

    pub fn verify_calls(&self) -> usize {
        self.script.lock().unwrap().verify_calls
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn initiate(&self, request: InitiatePayment) -> Result<Initiation, GatewayError> {
        let delay = self.script.lock().unwrap().initiate_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut script = self.script.lock().unwrap();
        if script.fail_initiate {
            return Err(GatewayError::Timeout);
        }
        script.issued += 1;
        let reference = script
            .queued_references
            .pop_front()
            .unwrap_or_else(|| format!("REF{}", script.issued));
        script.initiations.push(request);
        Ok(Initiation {
            authorization_url: format!("https://checkout.example/{reference}"),
            reference,
        })
    }

    async fn verify(&self, reference: &str) -> Result<Verification, GatewayError> {
        let mut script = self.script.lock().unwrap();
        script.verify_calls += 1;
        if script.fail_verify {
            return Err(GatewayError::Transport("connection reset".into()));
        }
        if script.paid.contains(reference) {
            Ok(Verification::from_status("success", None))
        } else {
            Ok(Verification::from_status(
                "pending",
                Some("Awaiting approval".into()),
            ))
        }
    }
}

/// Event 1 at 2.00 per vote, category 3, nominees 7 (`AB12CD`) and 8 (`XY34EF`).
pub async fn seeded_stores() -> Stores {
    let stores = Stores::in_memory();
    let ledger = stores.ledger.as_ref();
    ledger
        .upsert_event(Event {
            id: 1,
            name: "Ghana Music Awards".into(),
            cost: Money::new(dec!(2.00)).unwrap(),
        })
        .await
        .unwrap();
    ledger
        .upsert_category(Category {
            id: 3,
            event_id: 1,
            name: "Artiste of the Year".into(),
        })
        .await
        .unwrap();
    for (id, code, name) in [(7, "AB12CD", "Ama"), (8, "XY34EF", "Kofi")] {
        ledger
            .upsert_nominee(Nominee {
                id,
                code: code.into(),
                name: name.into(),
                category_id: 3,
                event_id: 1,
                votes: 0,
            })
            .await
            .unwrap();
    }
    stores
}

pub struct Hub {
    pub stores: Stores,
    pub gateway: ScriptedGateway,
    pub payments: PaymentService,
    pub engine: SettlementEngine,
    pub ussd: UssdService,
}

pub async fn hub() -> Hub {
    let stores = seeded_stores().await;
    let gateway = ScriptedGateway::default();
    let shared: SharedPaymentGateway = Arc::new(gateway.clone());
    let payments = PaymentService::new(&stores, shared.clone(), CALLBACK_URL);
    let engine = SettlementEngine::new(&stores, shared);
    let ussd = UssdService::new(&stores, payments.clone(), EMAIL_DOMAIN);
    Hub {
        stores,
        gateway,
        payments,
        engine,
        ussd,
    }
}

pub fn open(session_id: &str) -> UssdRequest {
    UssdRequest {
        session_id: session_id.into(),
        msisdn: PHONE.into(),
        network: "MTN".into(),
        new_session: true,
        user_data: String::new(),
    }
}

pub fn turn(session_id: &str, user_data: &str) -> UssdRequest {
    UssdRequest {
        user_data: user_data.into(),
        new_session: false,
        ..open(session_id)
    }
}
