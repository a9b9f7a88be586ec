mod common;

use std::sync::Arc;

use common::*;
use spendgate_core::{
    CallOutcome, EngineCall, EngineConfig, EngineService, ErrorKind, InMemoryToken, ManualClock,
    MemoryPublisher, PaymentEngine, TokenLedger, U256,
};

async fn funded_service() -> (EngineService<InMemoryToken>, Arc<MemoryPublisher>, spendgate_core::AgentId) {
    let clock = Arc::new(ManualClock::new(START));
    let mut engine = PaymentEngine::new(
        EngineConfig::default(),
        InMemoryToken::new("USDC"),
        clock,
    )
    .unwrap();
    let custody = engine.custody();
    engine.token_mut().mint(OWNER, amt(OWNER_FUNDS)).unwrap();
    engine
        .token_mut()
        .approve(OWNER, custody, amt(OWNER_FUNDS))
        .unwrap();

    let publisher = Arc::new(MemoryPublisher::new());
    let service = EngineService::new(engine, publisher.clone());

    let CallOutcome::AgentId(agent_id) = service
        .submit(
            OWNER,
            EngineCall::CreateAgent {
                delegate: DELEGATE,
                daily_limit: amt(1_000_000),
                per_tx_limit: amt(1_000),
            },
        )
        .await
        .unwrap()
    else {
        panic!("expected agent id");
    };
    service
        .submit(
            OWNER,
            EngineCall::Deposit {
                agent_id,
                amount: amt(100_000),
            },
        )
        .await
        .unwrap();
    service
        .submit(
            OWNER,
            EngineCall::SetMerchantWhitelist {
                agent_id,
                merchant: MERCHANT,
                allowed: true,
            },
        )
        .await
        .unwrap();

    (service, publisher, agent_id)
}

#[tokio::test]
async fn concurrent_payments_are_serialised() {
    let (service, publisher, agent_id) = funded_service().await;

    let mut handles = Vec::new();
    for _ in 0..50 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service
                .submit(
                    DELEGATE,
                    EngineCall::Pay {
                        agent_id,
                        merchant: MERCHANT,
                        amount: amt(1_000),
                        payload: Default::default(),
                    },
                )
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let balance = service
        .submit(KEEPER, EngineCall::BalanceOf { agent_id })
        .await
        .unwrap();
    assert_eq!(balance, CallOutcome::Amount(amt(50_000)));
    let merchant = service
        .with_engine(|e| e.token().balance_of(MERCHANT))
        .await;
    assert_eq!(merchant, amt(50_000));

    let records = publisher.records().await;
    let payments = records
        .iter()
        .filter(|r| r.event.name() == "AgentPayment")
        .count();
    assert_eq!(payments, 50);

    let mut sequences: Vec<u64> = records.iter().map(|r| r.sequence).collect();
    let expected: Vec<u64> = (0..sequences.len() as u64).collect();
    sequences.sort_unstable();
    assert_eq!(sequences, expected);
}

#[tokio::test]
async fn overspend_across_tasks_is_bounded_by_balance() {
    let (service, _, agent_id) = funded_service().await;

    let mut handles = Vec::new();
    for _ in 0..150 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service
                .submit(
                    DELEGATE,
                    EngineCall::Pay {
                        agent_id,
                        merchant: MERCHANT,
                        amount: amt(1_000),
                        payload: Default::default(),
                    },
                )
                .await
        }));
    }

    let mut ok = 0;
    let mut insufficient = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(err) => {
                assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
                insufficient += 1;
            }
        }
    }
    assert_eq!(ok, 100);
    assert_eq!(insufficient, 50);

    let balance = service
        .with_engine(|e| e.balance_of(agent_id))
        .await;
    assert_eq!(balance, U256::ZERO);
}
