//! Two-party end-to-end execution of the swap protocol over mock
//! collaborators: an in-memory wallet, a scripted foreign side adapter and a
//! shared simulated native chain that actually validates every registered
//! transaction. Wallet-side randomness is drawn from seeded ChaCha20 rngs so
//! the two-party runs are reproducible.

use mw_swap_core::crypto::{random_scalar, Scalar};
use mw_swap_core::messages::Message;
use mw_swap_core::params::{
    FailureReason, MemoryStorage, ParameterId, ParameterStore, Record, Storage, SubTxId,
};
use mw_swap_core::protocol::{
    accept_swap_parameters, init_new_swap, AtomicSwap, SwapContext, SwapEvent,
};
use mw_swap_core::side::{SecondSide, SecondSideFactory, SecondSideRegistry};
use mw_swap_core::swap::{
    Amount, Coin, ForeignCoin, Height, State, SwapId, Timestamp, TxStatus, WalletId,
};
use mw_swap_core::syncer::{ChainEvent, Gateway, RegistrationStatus, Wallet};
use mw_swap_core::transaction::{KernelId, Transaction, TxKernel, ValidationContext};

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

const NATIVE_AMOUNT: Amount = 1_000_000;
const NATIVE_FEE: Amount = 1_000;
const FOREIGN_AMOUNT: Amount = 50_000;
const MIN_HEIGHT: Height = 100;
const LIFETIME: Height = 720;
const NOW: Timestamp = 1_700_000_000;

#[derive(Debug)]
enum Request {
    Register(SubTxId, Transaction),
    Confirm(SubTxId, KernelId),
    GetKernel(SubTxId, KernelId),
}

#[derive(Default)]
struct MockGateway {
    tip: Option<Height>,
    async_pending: bool,
    requests: VecDeque<Request>,
    outbox: VecDeque<Message>,
    sent_log: Vec<Message>,
    completed: bool,
}

impl Gateway for MockGateway {
    fn tip(&self) -> Option<Height> {
        self.tip
    }

    fn register_tx(&mut self, _swap: SwapId, sub_tx: SubTxId, tx: &Transaction) {
        self.requests.push_back(Request::Register(sub_tx, tx.clone()));
    }

    fn confirm_kernel(&mut self, _swap: SwapId, sub_tx: SubTxId, kernel_id: &KernelId) {
        self.requests.push_back(Request::Confirm(sub_tx, *kernel_id));
    }

    fn get_kernel(&mut self, _swap: SwapId, sub_tx: SubTxId, kernel_id: &KernelId) {
        self.requests.push_back(Request::GetKernel(sub_tx, *kernel_id));
    }

    fn send_message(&mut self, _to: &WalletId, msg: Message) -> bool {
        self.sent_log.push(msg.clone());
        self.outbox.push_back(msg);
        true
    }

    fn update_on_next_tip(&mut self, _swap: SwapId) {}

    fn update_async(&mut self, _swap: SwapId) {
        self.async_pending = true;
    }

    fn on_completed(&mut self, _swap: SwapId) {
        self.completed = true;
    }
}

struct MockWallet {
    storage: MemoryStorage,
    rng: ChaCha20Rng,
    next_coin: u64,
    rolled_back: bool,
    saved: Vec<Coin>,
    completed_at: Option<Height>,
}

impl MockWallet {
    fn new(seed: u64) -> Self {
        MockWallet {
            storage: MemoryStorage::new(),
            rng: ChaCha20Rng::seed_from_u64(seed),
            next_coin: 0,
            rolled_back: false,
            saved: Vec::new(),
            completed_at: None,
        }
    }

    fn coin(&mut self, amount: Amount) -> Coin {
        self.next_coin += 1;
        Coin {
            id: self.next_coin,
            amount,
            blinding: random_scalar(&mut self.rng),
        }
    }
}

impl Storage for MockWallet {
    fn persist(&mut self, swap: SwapId, records: &[Record]) {
        self.storage.persist(swap, records);
    }

    fn load(&self, swap: SwapId) -> Vec<Record> {
        self.storage.load(swap)
    }
}

impl Wallet for MockWallet {
    fn is_own_address(&self, _id: &WalletId) -> bool {
        false
    }

    fn select_inputs(&mut self, total: Amount) -> Option<Vec<Coin>> {
        Some(vec![self.coin(total + 12_345)])
    }

    fn create_coin(&mut self, amount: Amount) -> Coin {
        self.coin(amount)
    }

    fn output_proof(&mut self, _coin: &Coin) -> Vec<u8> {
        vec![0x51; 32]
    }

    fn rollback(&mut self, _swap: SwapId) {
        self.rolled_back = true;
    }

    fn save_coin(&mut self, _swap: SwapId, coin: Coin) {
        self.saved.push(coin);
    }

    fn complete_coins(&mut self, _swap: SwapId, proof_height: Height) {
        self.completed_at = Some(proof_height);
    }
}

#[derive(Default)]
struct SideState {
    initialized: bool,
    valid_lock_time: bool,
    enough_time: bool,
    allow_lock_broadcast: bool,
    lock_broadcast: bool,
    lock_confirmable: bool,
    lock_time_expired: bool,
    refund_sent: bool,
    redeem_sent: bool,
}

struct MockSide {
    state: Rc<RefCell<SideState>>,
}

impl SecondSide for MockSide {
    fn initialize(&mut self, store: &mut ParameterStore) -> Result<bool, mw_swap_core::Error> {
        if store
            .get::<String>(ParameterId::AtomicSwapPublicKey)
            .is_none()
        {
            store.set(
                ParameterId::AtomicSwapPublicKey,
                "mock-foreign-key".to_string(),
            );
        }
        Ok(self.state.borrow().initialized)
    }

    fn init_lock_time(&mut self, store: &mut ParameterStore) -> Result<(), mw_swap_core::Error> {
        if store
            .get::<Timestamp>(ParameterId::AtomicSwapExternalLockTime)
            .is_none()
        {
            store.set(ParameterId::AtomicSwapExternalLockTime, NOW + 43_200);
        }
        Ok(())
    }

    fn validate_lock_time(&self, _store: &ParameterStore) -> bool {
        self.state.borrow().valid_lock_time
    }

    fn has_enough_time_to_process_lock_tx(&self, _store: &ParameterStore) -> bool {
        self.state.borrow().enough_time
    }

    fn send_lock_tx(&mut self, _store: &mut ParameterStore) -> bool {
        let mut state = self.state.borrow_mut();
        if state.allow_lock_broadcast {
            state.lock_broadcast = true;
        }
        state.lock_broadcast
    }

    fn confirm_lock_tx(&mut self, _store: &mut ParameterStore) -> bool {
        let state = self.state.borrow();
        state.lock_broadcast && state.lock_confirmable
    }

    fn is_lock_time_expired(&self, _store: &ParameterStore) -> bool {
        self.state.borrow().lock_time_expired
    }

    fn send_refund(&mut self, _store: &mut ParameterStore) -> bool {
        self.state.borrow_mut().refund_sent = true;
        true
    }

    fn confirm_refund_tx(&mut self, _store: &mut ParameterStore) -> bool {
        self.state.borrow().refund_sent
    }

    fn send_redeem(&mut self, _store: &mut ParameterStore) -> bool {
        self.state.borrow_mut().redeem_sent = true;
        true
    }

    fn confirm_redeem_tx(&mut self, _store: &mut ParameterStore) -> bool {
        self.state.borrow().redeem_sent
    }

    fn add_tx_details(&self, _store: &ParameterStore, msg: &mut Message) {
        msg.add(
            ParameterId::AtomicSwapPeerPublicKey,
            "mock-foreign-key".to_string(),
        );
        msg.add(ParameterId::AtomicSwapExternalTxId, "f00d".to_string());
        msg.add(ParameterId::AtomicSwapExternalTxOutputIndex, 0u32);
    }
}

struct MockSideFactory {
    state: Rc<RefCell<SideState>>,
}

impl SecondSideFactory for MockSideFactory {
    fn create_second_side(
        &self,
        _store: &ParameterStore,
        _is_native_side: bool,
    ) -> Box<dyn SecondSide> {
        Box::new(MockSide {
            state: self.state.clone(),
        })
    }
}

struct Party {
    swap: AtomicSwap,
    wallet: MockWallet,
    gateway: MockGateway,
    registry: SecondSideRegistry,
}

impl Party {
    fn new(id: SwapId, store: ParameterStore, side: Rc<RefCell<SideState>>, seed: u64) -> Self {
        let mut registry = SecondSideRegistry::new();
        registry.register_factory(ForeignCoin::Bitcoin, Box::new(MockSideFactory { state: side }));
        Party {
            swap: AtomicSwap::new(id, store),
            wallet: MockWallet::new(seed),
            gateway: MockGateway::default(),
            registry,
        }
    }

    /// Rebuild the machine from the wallet's persisted records, as a wallet
    /// restart would.
    fn reload(&mut self, id: SwapId) {
        self.swap = AtomicSwap::load(id, &self.wallet);
    }

    fn handle(&mut self, event: SwapEvent) {
        let mut ctx = SwapContext {
            wallet: &mut self.wallet,
            gateway: &mut self.gateway,
            registry: &self.registry,
        };
        self.swap.handle(event, &mut ctx);
    }

    fn turn(&mut self) {
        self.handle(SwapEvent::Tick);
    }

    fn deliver(&mut self, msg: Message) {
        self.handle(SwapEvent::PeerMessage(msg));
    }

    fn chain_event(&mut self, event: ChainEvent) {
        self.handle(SwapEvent::Chain(event));
    }

    fn cancel(&mut self) {
        let mut ctx = SwapContext {
            wallet: &mut self.wallet,
            gateway: &mut self.gateway,
            registry: &self.registry,
        };
        self.swap.cancel(&mut ctx);
    }

    fn state(&self) -> State {
        self.swap.state()
    }

    fn status(&self) -> TxStatus {
        self.swap.status()
    }
}

#[derive(Default)]
struct Chain {
    kernels: HashMap<KernelId, (TxKernel, Height)>,
}

#[derive(Clone, Copy)]
struct ChainPolicy {
    service: bool,
    accept_register: bool,
    serve_kernel_bodies: bool,
}

const OPEN: ChainPolicy = ChainPolicy {
    service: true,
    accept_register: true,
    serve_kernel_bodies: true,
};

fn service(chain: &mut Chain, party: &mut Party, policy: ChainPolicy) -> bool {
    if !policy.service {
        return false;
    }
    let mut progress = false;
    while let Some(request) = party.gateway.requests.pop_front() {
        progress = true;
        let tip = party.gateway.tip.unwrap_or(0);
        match request {
            Request::Register(sub_tx, tx) => {
                let valid = tx
                    .validate(&ValidationContext { min_height: tip })
                    .is_ok();
                if policy.accept_register && valid {
                    chain.kernels.insert(tx.kernel.id(), (tx.kernel, tip));
                    party.chain_event(ChainEvent::TransactionRegistered {
                        sub_tx,
                        status: RegistrationStatus::Ok,
                    });
                } else {
                    party.chain_event(ChainEvent::TransactionRegistered {
                        sub_tx,
                        status: RegistrationStatus::InvalidContext,
                    });
                    party.chain_event(ChainEvent::KernelUnconfirmed {
                        sub_tx,
                        height: tip,
                    });
                }
            }
            Request::Confirm(sub_tx, kernel_id) => match chain.kernels.get(&kernel_id) {
                Some((_, height)) => {
                    let height = *height;
                    party.chain_event(ChainEvent::KernelProof { sub_tx, height });
                }
                None => {
                    party.chain_event(ChainEvent::KernelUnconfirmed {
                        sub_tx,
                        height: tip,
                    });
                }
            },
            Request::GetKernel(sub_tx, kernel_id) => {
                if policy.serve_kernel_bodies {
                    if let Some((kernel, _)) = chain.kernels.get(&kernel_id) {
                        let kernel = *kernel;
                        party.chain_event(ChainEvent::KernelBody { sub_tx, kernel });
                    }
                }
            }
        }
    }
    progress
}

fn pump_with_tamper(
    chain: &mut Chain,
    a: &mut Party,
    pa: ChainPolicy,
    b: &mut Party,
    pb: ChainPolicy,
    tamper_a_to_b: &dyn Fn(Message) -> Message,
) {
    for _ in 0..200 {
        let mut progress = false;

        progress |= service(chain, a, pa);
        progress |= service(chain, b, pb);

        while let Some(msg) = a.gateway.outbox.pop_front() {
            b.deliver(tamper_a_to_b(msg));
            progress = true;
        }
        while let Some(msg) = b.gateway.outbox.pop_front() {
            a.deliver(msg);
            progress = true;
        }

        if a.gateway.async_pending {
            a.gateway.async_pending = false;
            a.turn();
            progress = true;
        }
        if b.gateway.async_pending {
            b.gateway.async_pending = false;
            b.turn();
            progress = true;
        }

        if !progress {
            break;
        }
    }
}

fn pump(chain: &mut Chain, a: &mut Party, pa: ChainPolicy, b: &mut Party, pb: ChainPolicy) {
    pump_with_tamper(chain, a, pa, b, pb, &|msg| msg);
}

fn advance_tip(a: &mut Party, b: &mut Party, height: Height) {
    a.gateway.tip = Some(height);
    b.gateway.tip = Some(height);
    a.handle(SwapEvent::Tip(height));
    b.handle(SwapEvent::Tip(height));
}

/// `a` publishes the swap on the foreign side; `b` accepts it and becomes
/// the native side wire initiator.
fn setup(response_time: Height) -> (SwapId, Party, Party, Rc<RefCell<SideState>>) {
    let a_id = WalletId::from_low_u64_be(1);
    let b_id = WalletId::from_low_u64_be(2);

    let (swap_id, mut store_a) = init_new_swap(
        a_id,
        MIN_HEIGHT,
        NATIVE_AMOUNT,
        NATIVE_FEE,
        ForeignCoin::Bitcoin,
        FOREIGN_AMOUNT,
        false,
        LIFETIME,
        response_time,
        NOW,
    );
    let store_b = accept_swap_parameters(&store_a, b_id);
    store_a.set(ParameterId::PeerId, b_id);

    let side = Rc::new(RefCell::new(SideState {
        initialized: true,
        valid_lock_time: true,
        enough_time: true,
        allow_lock_broadcast: true,
        lock_confirmable: true,
        ..Default::default()
    }));

    let a = Party::new(swap_id, store_a, side.clone(), 0xa11ce);
    let b = Party::new(swap_id, store_b, side.clone(), 0xb0b);
    (swap_id, a, b, side)
}

fn assert_no_secret_leaked(party: &Party) {
    for msg in &party.gateway.sent_log {
        for (id, _) in msg.parameters() {
            assert!(
                !matches!(
                    id,
                    ParameterId::AtomicSwapSecretPrivateKey
                        | ParameterId::Offset
                        | ParameterId::Nonce
                        | ParameterId::BlindingExcess
                        | ParameterId::SharedBlindingFactor
                        | ParameterId::InputCoins
                ),
                "secret bearing parameter {} went on the wire",
                id
            );
        }
    }
}

#[test]
fn happy_path_completes_on_both_sides() {
    let (_, mut a, mut b, side) = setup(1440);
    let mut chain = Chain::default();

    // Negotiate and confirm the native lock at height 100, but hold the
    // foreign party's redeem back until height 120.
    let defer = ChainPolicy {
        service: false,
        ..OPEN
    };
    advance_tip(&mut a, &mut b, 100);
    pump(&mut chain, &mut a, defer, &mut b, OPEN);

    advance_tip(&mut a, &mut b, 120);
    pump(&mut chain, &mut a, OPEN, &mut b, OPEN);

    assert_eq!(a.state(), State::CompleteSwap);
    assert_eq!(b.state(), State::CompleteSwap);
    assert_eq!(a.status(), TxStatus::Completed);
    assert_eq!(b.status(), TxStatus::Completed);
    assert!(a.gateway.completed);
    assert!(b.gateway.completed);

    // The foreign party received the shared output minus the withdraw fee.
    assert_eq!(a.wallet.saved.len(), 1);
    assert!(a.wallet.saved[0].amount < NATIVE_AMOUNT);

    // The native side recovered the secret from the published kernel and
    // redeemed the foreign coin with it.
    let secret = b
        .swap
        .store()
        .get_sub::<Scalar>(ParameterId::AtomicSwapSecretPrivateKey, SubTxId::NativeRedeemTx);
    assert!(secret.is_some());
    assert!(side.borrow().redeem_sent);

    assert_no_secret_leaked(&a);
    assert_no_secret_leaked(&b);
}

#[test]
fn required_parameters_are_persisted() {
    let (swap_id, mut a, mut b, _side) = setup(1440);
    let mut chain = Chain::default();

    advance_tip(&mut a, &mut b, 100);
    pump(&mut chain, &mut a, OPEN, &mut b, OPEN);

    for party in [&a, &b] {
        let store = ParameterStore::from_records(party.wallet.load(swap_id));
        assert!(store.get::<Height>(ParameterId::MinHeight).is_some());
        assert!(store.get::<Height>(ParameterId::PeerResponseHeight).is_some());
        assert!(store.get::<Amount>(ParameterId::Fee).is_some());
        assert!(store.get::<Amount>(ParameterId::Amount).is_some());
        assert!(store.get::<Amount>(ParameterId::AtomicSwapAmount).is_some());
        assert!(store
            .get::<bool>(ParameterId::AtomicSwapIsNativeSide)
            .is_some());
        assert!(store.get::<bool>(ParameterId::IsSender).is_some());
        assert!(store.get::<bool>(ParameterId::IsInitiator).is_some());
        assert!(store.get::<WalletId>(ParameterId::MyId).is_some());
    }
}

#[test]
fn foreign_lock_never_appears_expires_without_notify() {
    let (_, mut a, mut b, mut_side) = setup(50);
    mut_side.borrow_mut().allow_lock_broadcast = false;
    let mut chain = Chain::default();

    advance_tip(&mut a, &mut b, 100);
    pump(&mut chain, &mut a, OPEN, &mut b, OPEN);
    assert_eq!(b.state(), State::HandlingContractTx);

    // Response window is min_height + 50 = 150; one block later the swap is
    // expired.
    advance_tip(&mut a, &mut b, 151);
    pump(&mut chain, &mut a, OPEN, &mut b, OPEN);

    assert_eq!(b.state(), State::Failed);
    assert_eq!(b.status(), TxStatus::Failed);
    assert_eq!(
        b.swap
            .store()
            .get::<FailureReason>(ParameterId::InternalFailureReason),
        Some(FailureReason::TransactionExpired)
    );
    assert!(b.wallet.rolled_back);
    assert!(!b
        .gateway
        .sent_log
        .iter()
        .any(|msg| msg.contains(ParameterId::FailureReason)));

    // Expiry is monotone: nothing changes at later tips.
    advance_tip(&mut a, &mut b, 400);
    pump(&mut chain, &mut a, OPEN, &mut b, OPEN);
    assert_eq!(b.state(), State::Failed);
}

#[test]
fn crash_after_lock_resumes_and_extracts_secret() {
    let (swap_id, mut a, mut b, _side) = setup(1440);
    let mut chain = Chain::default();

    // The native side cannot fetch kernel bodies yet: it stalls right
    // before extracting the secret, while the peer completes its redeem.
    let no_bodies = ChainPolicy {
        serve_kernel_bodies: false,
        ..OPEN
    };
    advance_tip(&mut a, &mut b, 100);
    pump(&mut chain, &mut a, OPEN, &mut b, no_bodies);

    assert_eq!(a.state(), State::CompleteSwap);
    assert_eq!(b.state(), State::SendingNativeRedeemTx);

    // Restart the native wallet from its database.
    b.reload(swap_id);
    assert_eq!(b.state(), State::SendingNativeRedeemTx);

    b.turn();
    pump(&mut chain, &mut a, OPEN, &mut b, OPEN);

    assert_eq!(b.state(), State::CompleteSwap);
    assert!(b
        .swap
        .store()
        .get_sub::<Scalar>(ParameterId::AtomicSwapSecretPrivateKey, SubTxId::NativeRedeemTx)
        .is_some());
}

#[test]
fn vanished_peer_leads_both_sides_to_refund() {
    let (_, mut a, mut b, side) = setup(1440);
    let mut chain = Chain::default();

    // The foreign party's native redeem is rejected by the node, as if the
    // shared output were no longer spendable for it.
    let reject = ChainPolicy {
        accept_register: false,
        ..OPEN
    };
    advance_tip(&mut a, &mut b, 100);
    pump(&mut chain, &mut a, reject, &mut b, OPEN);

    assert_eq!(a.state(), State::SendingRefundTx);
    assert_eq!(b.state(), State::SendingNativeRedeemTx);

    // Past both lock windows each side withdraws on its own chain.
    side.borrow_mut().lock_time_expired = true;
    advance_tip(&mut a, &mut b, MIN_HEIGHT + 4 * 24 * 60 + 1);
    pump(&mut chain, &mut a, OPEN, &mut b, OPEN);

    assert_eq!(a.state(), State::Refunded);
    assert_eq!(b.state(), State::Refunded);
    assert!(side.borrow().refund_sent);
    // The native side got its shared output back as a fresh coin.
    assert_eq!(b.wallet.saved.len(), 1);
}

#[test]
fn cancel_is_ignored_for_native_side_in_contract_state() {
    eprintln!("STEP0");
    let (_, mut a, mut b, side) = setup(1440);
    side.borrow_mut().allow_lock_broadcast = false;
    let mut chain = Chain::default();

    eprintln!("STEP1");
    advance_tip(&mut a, &mut b, 100);
    eprintln!("STEP2");
    pump(&mut chain, &mut a, OPEN, &mut b, OPEN);
    eprintln!("STEP3");
    assert_eq!(b.state(), State::HandlingContractTx);

    eprintln!("STEP4");
    b.cancel();
    eprintln!("STEP5");
    pump(&mut chain, &mut a, OPEN, &mut b, OPEN);
    eprintln!("STEP6");
    assert_eq!(b.state(), State::HandlingContractTx);
    assert_ne!(b.status(), TxStatus::Canceled);

    // The swap continues once the foreign lock shows up.
    side.borrow_mut().allow_lock_broadcast = true;
    advance_tip(&mut a, &mut b, 101);
    eprintln!("STEP7");
    pump(&mut chain, &mut a, OPEN, &mut b, OPEN);
    eprintln!("STEP8");
    assert_eq!(b.state(), State::CompleteSwap);
}

#[test]
fn cancel_is_honored_for_foreign_side_before_lock_broadcast() {
    let (_, mut a, mut b, side) = setup(1440);
    side.borrow_mut().allow_lock_broadcast = false;
    let mut chain = Chain::default();

    advance_tip(&mut a, &mut b, 100);
    pump(&mut chain, &mut a, OPEN, &mut b, OPEN);
    assert_eq!(a.state(), State::HandlingContractTx);

    a.cancel();
    pump(&mut chain, &mut a, OPEN, &mut b, OPEN);

    assert_eq!(a.state(), State::Canceled);
    assert_eq!(a.status(), TxStatus::Canceled);
    assert!(a.wallet.rolled_back);

    // The peer was told and failed out with a rollback of its own.
    assert_eq!(b.state(), State::Failed);
    assert_eq!(
        b.swap.store().get::<FailureReason>(ParameterId::FailureReason),
        Some(FailureReason::Canceled)
    );
    assert!(b.wallet.rolled_back);
}

#[test]
fn tampered_lock_signature_fails_both_sides_safely() {
    let (_, mut a, mut b, _side) = setup(1440);
    let mut chain = Chain::default();

    advance_tip(&mut a, &mut b, 100);
    let tamper_rng = RefCell::new(ChaCha20Rng::seed_from_u64(0xbad));
    pump_with_tamper(&mut chain, &mut a, OPEN, &mut b, OPEN, &|msg| {
        // Corrupt the partial signature of the lock confirmation only.
        if msg.sub_tx == SubTxId::NativeLockTx && msg.contains(ParameterId::PeerSignature) {
            let mut tampered = Message::new(msg.swap_id).with_sub_tx(msg.sub_tx);
            for (id, value) in msg.parameters() {
                if *id == ParameterId::PeerSignature {
                    tampered.add(*id, random_scalar(&mut *tamper_rng.borrow_mut()));
                } else {
                    tampered.add(*id, value.clone());
                }
            }
            tampered
        } else {
            msg
        }
    });

    // The honest native side never broadcast anything and failed out.
    assert_eq!(b.state(), State::Failed);
    assert!(b.wallet.rolled_back);
    assert!(chain.kernels.is_empty());

    // The peer was notified and reached a terminal state as well.
    assert_eq!(a.state(), State::Failed);
}

#[test]
fn rollback_is_idempotent() {
    let (_, mut a, mut b, _side) = setup(1440);
    let mut chain = Chain::default();

    // Stop before the foreign party registers its redeem: the native lock
    // is confirmed, nothing else is.
    let defer = ChainPolicy {
        service: false,
        ..OPEN
    };
    advance_tip(&mut a, &mut b, 100);
    pump(&mut chain, &mut a, defer, &mut b, OPEN);
    assert_eq!(b.state(), State::SendingNativeRedeemTx);

    assert!(b.swap.rollback(99));
    let state_after_first = b.state();
    assert_eq!(state_after_first, State::SendingNativeLockTx);

    assert!(!b.swap.rollback(99));
    assert_eq!(b.state(), state_after_first);
}
