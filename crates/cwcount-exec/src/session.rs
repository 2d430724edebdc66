//! Read-mutate-read session against the counter contract.
//!
//! Every call is awaited before the next one is issued, so a query that follows
//! an execute always observes a state that includes the execute's receipt.
//! The first error ends the session.

use std::io::Write;

use crate::error::SessionError;
use crate::ledger::LedgerClient;
use crate::types::{
    CountResponse, Event, ExecuteMsg, FeeSpec, QueryMsg, TargetDescriptor, TxReceipt,
};

/// Value written by the `set` step when none is given.
pub const DEFAULT_SET_COUNT: u8 = 200;
/// Event type the contract's own attributes are reported under.
pub const DEFAULT_EVENT_TYPE: &str = "wasm";

/// One signer talking to one contract with fixed fee terms.
pub struct Session<'a, L: LedgerClient + ?Sized> {
    client: &'a L,
    target: &'a TargetDescriptor,
    fee: &'a FeeSpec,
    event_type: &'a str,
}

impl<'a, L: LedgerClient + ?Sized> Session<'a, L> {
    pub fn new(client: &'a L, target: &'a TargetDescriptor, fee: &'a FeeSpec) -> Self {
        Session {
            client,
            target,
            fee,
            event_type: DEFAULT_EVENT_TYPE,
        }
    }

    /// Report attributes from events of this type instead of `wasm`.
    pub fn with_event_type(mut self, event_type: &'a str) -> Self {
        self.event_type = event_type;
        self
    }

    /// Query, increment, query, set, query.
    pub async fn run<W: Write>(&self, set_count: u8, out: &mut W) -> Result<(), SessionError> {
        log::info!(
            "session: contract {} as {} (fees {}, gas {})",
            self.target.contract,
            self.target.sender,
            self.fee.fees_arg(),
            self.fee.gas
        );

        let initial = self.query_count(out).await?;

        self.increment(out).await?;
        let after_increment = self.query_count(out).await?;
        check_expected("increment", initial.checked_add(1), after_increment);

        self.set(set_count, out).await?;
        let after_set = self.query_count(out).await?;
        check_expected("set", Some(set_count), after_set);

        Ok(())
    }

    /// Query the current count and display it.
    pub async fn query_count<W: Write>(&self, out: &mut W) -> Result<u8, SessionError> {
        let response = self
            .client
            .query(&self.target.contract, &QueryMsg::GetCount {})
            .await?;
        log::info!("get_count -> {}", response.count);
        write!(out, "{}", format_count(&response))?;
        Ok(response.count)
    }

    pub async fn increment<W: Write>(&self, out: &mut W) -> Result<(), SessionError> {
        self.execute(ExecuteMsg::Increment {}, out).await
    }

    pub async fn set<W: Write>(&self, count: u8, out: &mut W) -> Result<(), SessionError> {
        self.execute(ExecuteMsg::Set { count }, out).await
    }

    async fn execute<W: Write>(&self, msg: ExecuteMsg, out: &mut W) -> Result<(), SessionError> {
        log::info!("executing {}", msg.method());
        let receipt = self
            .client
            .execute(&self.target.sender, &self.target.contract, &msg, self.fee)
            .await?;

        let event = receipt
            .find_event(self.event_type)
            .ok_or_else(|| SessionError::MissingEvent {
                txhash: receipt.txhash.clone(),
                event_type: self.event_type.to_string(),
            })?;

        write!(out, "{}", format_attributes(msg.method(), &receipt, event))?;
        Ok(())
    }
}

/// Log a warning when a follow-up query does not show the expected count.
fn check_expected(step: &str, expected: Option<u8>, observed: u8) {
    match expected {
        Some(expected) if expected != observed => {
            log::warn!(
                "after {} expected count {} but contract reports {}",
                step,
                expected,
                observed
            );
        }
        _ => {}
    }
}

pub fn format_count(response: &CountResponse) -> String {
    format!("count: {}\n", response.count)
}

pub fn format_attributes(method: &str, receipt: &TxReceipt, event: &Event) -> String {
    let mut out = format!(
        "{}: tx {} (height {})\n",
        method, receipt.txhash, receipt.height
    );
    for attr in &event.attributes {
        out.push_str(&format!("  {}: {}\n", attr.key, attr.value));
    }
    out
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::LedgerError;
    use crate::types::{Attribute, Coin};

    const ALICE: &str = "juno1gjqnuhv52pd2a7ets2vhw9w9qa9knyhyqd4qeg";
    const CONTRACT: &str = "juno14hj2tavq8fpesdwxxcu44rty3hh90vhujrvcmstl4zr3txmfvw9skjuwg8";

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Query,
        Execute(ExecuteMsg),
        Receipt(&'static str),
    }

    struct MockState {
        count: u8,
        calls: Vec<Call>,
        fees: Vec<FeeSpec>,
        /// Index (among query/execute calls) that fails with a network error
        fail_at: Option<usize>,
        issued: usize,
        event_type: &'static str,
    }

    /// In-memory counter contract with the same event layout as a real chain.
    struct MockLedger {
        state: Mutex<MockState>,
    }

    impl MockLedger {
        fn new(count: u8) -> Self {
            MockLedger {
                state: Mutex::new(MockState {
                    count,
                    calls: vec![],
                    fees: vec![],
                    fail_at: None,
                    issued: 0,
                    event_type: "wasm",
                }),
            }
        }

        fn failing_at(count: u8, index: usize) -> Self {
            let ledger = Self::new(count);
            ledger.state.lock().unwrap().fail_at = Some(index);
            ledger
        }

        fn emitting(count: u8, event_type: &'static str) -> Self {
            let ledger = Self::new(count);
            ledger.state.lock().unwrap().event_type = event_type;
            ledger
        }

        fn calls(&self) -> Vec<Call> {
            self.state.lock().unwrap().calls.clone()
        }

        fn count(&self) -> u8 {
            self.state.lock().unwrap().count
        }

        fn fees(&self) -> Vec<FeeSpec> {
            self.state.lock().unwrap().fees.clone()
        }

        fn issue(&self, call: Call) -> Result<(), LedgerError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call);
            let index = state.issued;
            state.issued += 1;
            if state.fail_at == Some(index) {
                return Err(LedgerError::Network("connection reset".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl LedgerClient for MockLedger {
        async fn query(
            &self,
            contract: &str,
            msg: &QueryMsg,
        ) -> Result<CountResponse, LedgerError> {
            assert_eq!(contract, CONTRACT);
            assert_eq!(msg, &QueryMsg::GetCount {});
            self.issue(Call::Query)?;
            Ok(CountResponse {
                count: self.count(),
            })
        }

        async fn execute(
            &self,
            sender: &str,
            contract: &str,
            msg: &ExecuteMsg,
            fee: &FeeSpec,
        ) -> Result<TxReceipt, LedgerError> {
            assert_eq!(sender, ALICE);
            assert_eq!(contract, CONTRACT);
            self.issue(Call::Execute(msg.clone()))?;

            // Give a concurrently issued query the chance to run first.
            tokio::task::yield_now().await;

            let mut state = self.state.lock().unwrap();
            state.fees.push(fee.clone());
            let new_count = match msg {
                ExecuteMsg::Increment {} => {
                    state.count.checked_add(1).ok_or_else(|| LedgerError::TxFailed {
                        hash: "OVERFLOW".into(),
                        code: 5,
                        raw_log: "Overflow: Cannot Add".into(),
                    })?
                }
                ExecuteMsg::Set { count } => *count,
            };
            state.count = new_count;
            state.calls.push(Call::Receipt(msg.method()));

            let height = 100 + state.calls.len() as u64;
            Ok(TxReceipt {
                txhash: format!("TX{}", height),
                height,
                gas_wanted: fee.gas,
                gas_used: fee.gas / 2,
                events: vec![
                    Event {
                        kind: "execute".into(),
                        attributes: vec![Attribute::new("_contract_address", CONTRACT)],
                    },
                    Event {
                        kind: "message".into(),
                        attributes: vec![
                            Attribute::new("action", "/cosmwasm.wasm.v1.MsgExecuteContract"),
                            Attribute::new("sender", ALICE),
                        ],
                    },
                    Event {
                        kind: state.event_type.into(),
                        attributes: vec![
                            Attribute::new("_contract_address", CONTRACT),
                            Attribute::new("method", msg.method()),
                            Attribute::new("owner", ALICE),
                            Attribute::new("count", &new_count.to_string()),
                        ],
                    },
                ],
            })
        }
    }

    fn target() -> TargetDescriptor {
        TargetDescriptor {
            contract: CONTRACT.into(),
            sender: ALICE.into(),
        }
    }

    fn fee() -> FeeSpec {
        FeeSpec {
            amount: vec![Coin::new(625, "ujunox")],
            gas: 250_000,
        }
    }

    fn output(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }

    fn reported_counts(text: &str) -> Vec<u8> {
        text.lines()
            .filter_map(|l| l.strip_prefix("count: "))
            .map(|v| v.parse().unwrap())
            .collect()
    }

    fn attribute_counts(text: &str) -> Vec<u8> {
        text.lines()
            .filter_map(|l| l.strip_prefix("  count: "))
            .map(|v| v.parse().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn end_to_end_from_zero() {
        let ledger = MockLedger::new(0);
        let (target, fee) = (target(), fee());
        let mut out = Vec::new();

        Session::new(&ledger, &target, &fee)
            .run(200, &mut out)
            .await
            .unwrap();

        let text = output(out);
        assert_eq!(reported_counts(&text), vec![0, 1, 200]);
        assert_eq!(attribute_counts(&text), vec![1, 200]);
        assert!(text.contains("increment: tx "));
        assert!(text.contains("set: tx "));
        assert!(text.contains(&format!("  owner: {}", ALICE)));
        assert_eq!(ledger.count(), 200);
    }

    #[tokio::test]
    async fn increment_is_observed_by_next_query() {
        for start in [0u8, 7, 254] {
            let ledger = MockLedger::new(start);
            let (target, fee) = (target(), fee());
            let mut out = Vec::new();

            Session::new(&ledger, &target, &fee)
                .run(DEFAULT_SET_COUNT, &mut out)
                .await
                .unwrap();

            let counts = reported_counts(&output(out));
            assert_eq!(counts[0], start);
            assert_eq!(counts[1], start + 1);
        }
    }

    #[tokio::test]
    async fn set_value_is_independent_of_prior_state() {
        for (start, value) in [(0u8, 0u8), (3, 42), (250, 255), (255, 1)] {
            let ledger = MockLedger::new(start);
            let (target, fee) = (target(), fee());
            let session = Session::new(&ledger, &target, &fee);
            let mut out = Vec::new();

            session.set(value, &mut out).await.unwrap();
            let observed = session.query_count(&mut out).await.unwrap();
            assert_eq!(observed, value);
        }
    }

    #[tokio::test]
    async fn queries_follow_receipts() {
        let ledger = MockLedger::new(5);
        let (target, fee) = (target(), fee());
        let mut out = Vec::new();

        Session::new(&ledger, &target, &fee)
            .run(200, &mut out)
            .await
            .unwrap();

        assert_eq!(
            ledger.calls(),
            vec![
                Call::Query,
                Call::Execute(ExecuteMsg::Increment {}),
                Call::Receipt("increment"),
                Call::Query,
                Call::Execute(ExecuteMsg::Set { count: 200 }),
                Call::Receipt("set"),
                Call::Query,
            ]
        );
    }

    #[tokio::test]
    async fn both_mutations_use_identical_fee() {
        let ledger = MockLedger::new(0);
        let (target, fee) = (target(), fee());
        let mut out = Vec::new();

        Session::new(&ledger, &target, &fee)
            .run(200, &mut out)
            .await
            .unwrap();

        let fees = ledger.fees();
        assert_eq!(fees.len(), 2);
        let first = serde_json::to_vec(&fees[0]).unwrap();
        let second = serde_json::to_vec(&fees[1]).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, serde_json::to_vec(&fee).unwrap());
    }

    #[tokio::test]
    async fn failure_stops_remaining_steps() {
        // Five ledger calls: query, increment, query, set, query.
        for fail_at in 0..5 {
            let ledger = MockLedger::failing_at(0, fail_at);
            let (target, fee) = (target(), fee());
            let mut out = Vec::new();

            let err = Session::new(&ledger, &target, &fee)
                .run(200, &mut out)
                .await
                .unwrap_err();
            assert!(matches!(err, SessionError::Ledger(LedgerError::Network(_))));

            let issued = ledger
                .calls()
                .iter()
                .filter(|c| !matches!(c, Call::Receipt(_)))
                .count();
            assert_eq!(issued, fail_at + 1, "fail_at {}", fail_at);

            // Only steps before the failure produced output.
            let text = output(out);
            let displayed = reported_counts(&text).len() + attribute_counts(&text).len();
            assert_eq!(displayed, fail_at, "fail_at {}", fail_at);
        }
    }

    #[tokio::test]
    async fn contract_rejection_propagates_unmodified() {
        let ledger = MockLedger::new(255);
        let (target, fee) = (target(), fee());
        let mut out = Vec::new();

        let err = Session::new(&ledger, &target, &fee)
            .run(200, &mut out)
            .await
            .unwrap_err();
        match err {
            SessionError::Ledger(LedgerError::TxFailed { code, raw_log, .. }) => {
                assert_eq!(code, 5);
                assert!(raw_log.contains("Overflow"));
            }
            other => panic!("expected TxFailed, got {:?}", other),
        }
        assert_eq!(
            ledger.calls(),
            vec![Call::Query, Call::Execute(ExecuteMsg::Increment {})]
        );
        assert_eq!(reported_counts(&output(out)), vec![255]);
    }

    #[tokio::test]
    async fn missing_event_stops_session() {
        let ledger = MockLedger::emitting(0, "wasm-counter");
        let (target, fee) = (target(), fee());
        let mut out = Vec::new();

        let err = Session::new(&ledger, &target, &fee)
            .run(200, &mut out)
            .await
            .unwrap_err();
        match err {
            SessionError::MissingEvent { event_type, .. } => assert_eq!(event_type, "wasm"),
            other => panic!("expected MissingEvent, got {:?}", other),
        }
        assert_eq!(ledger.calls().len(), 3);
    }

    #[tokio::test]
    async fn custom_event_type_is_reported() {
        let ledger = MockLedger::emitting(0, "wasm-counter");
        let (target, fee) = (target(), fee());
        let mut out = Vec::new();

        Session::new(&ledger, &target, &fee)
            .with_event_type("wasm-counter")
            .run(9, &mut out)
            .await
            .unwrap();

        assert_eq!(attribute_counts(&output(out)), vec![1, 9]);
    }

    #[tokio::test]
    async fn output_has_no_blank_lines() {
        let ledger = MockLedger::new(0);
        let (target, fee) = (target(), fee());
        let mut out = Vec::new();

        Session::new(&ledger, &target, &fee)
            .run(200, &mut out)
            .await
            .unwrap();

        let text = output(out);
        assert!(text.starts_with("count: 0\nincrement: tx "));
        assert!(text.ends_with("  count: 200\ncount: 200\n"));
        assert!(!text.contains("\n\n"));
    }

    #[test]
    fn format_attributes_lists_every_pair() {
        let event = Event {
            kind: "wasm".into(),
            attributes: vec![
                Attribute::new("method", "set"),
                Attribute::new("count", "200"),
            ],
        };
        let receipt = TxReceipt {
            txhash: "ABCD".into(),
            height: 77,
            gas_wanted: 0,
            gas_used: 0,
            events: vec![event.clone()],
        };
        assert_eq!(
            format_attributes("set", &receipt, &event),
            "set: tx ABCD (height 77)\n  method: set\n  count: 200\n"
        );
        assert_eq!(format_count(&CountResponse { count: 3 }), "count: 3\n");
    }
}
