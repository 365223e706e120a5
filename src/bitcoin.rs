// Copyright 2021-2022 Farcaster Devs
//
// This library is free software; you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public
// License as published by the Free Software Foundation; either
// version 3 of the License, or (at your option) any later version.
//
// This library is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this library; if not, write to the Free Software
// Foundation, Inc., 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301, USA

//! Bitcoin-family implementation of the [`SecondSide`] adapter. The contract
//! is a two-branch script: the claim branch needs the counter-party key and
//! a signature under the swap secret key, the timeout branch refunds the
//! locker after the external lock time. Chain access goes through the
//! [`BitcoinClient`] trait so the adapter itself stays polled and
//! non-blocking.

use bitcoin::blockdata::opcodes::all as opcodes;
use bitcoin::blockdata::script::{Builder, Script};
use bitcoin::{PublicKey, Txid};

use std::str::FromStr;

use crate::crypto::{Point, Scalar};
use crate::messages::Message;
use crate::params::{ParameterId, ParameterStore, SubTxId};
use crate::side::{SecondSide, SecondSideFactory};
use crate::swap::{Amount, Timestamp};

/// Foreign lock window granted by the initiator, in seconds.
pub const FOREIGN_LOCK_TIME_SECS: Timestamp = 12 * 60 * 60;

/// Remaining window under which a responder rejects the proposed lock time,
/// and under which the foreign side refuses to broadcast its lock.
pub const MIN_LOCK_MARGIN_SECS: Timestamp = 2 * 60 * 60;

/// Confirmations required on the foreign lock before the swap proceeds.
pub const LOCK_TX_CONFIRMATIONS: u32 = 6;

/// Confirmations required on the foreign redeem and refund.
pub const WITHDRAW_TX_CONFIRMATIONS: u32 = 1;

/// Chain and wallet access of the Bitcoin-family adapter. Every method is
/// polled; `None` means "not yet".
pub trait BitcoinClient {
    /// The local party's foreign chain public key, hex encoded.
    fn local_public_key(&self) -> String;

    /// Median time past of the foreign chain tip.
    fn median_time(&self) -> Option<Timestamp>;

    /// Fund and broadcast the contract output. Returns the txid and output
    /// index once the wallet has done so.
    fn fund_htlc(&mut self, amount: Amount, script: &Script) -> Option<(Txid, u32)>;

    /// The amount and script of a contract output observed on-chain.
    fn htlc_output(&self, txid: &Txid, vout: u32) -> Option<(Amount, Script)>;

    fn confirmations(&self, txid: &Txid) -> Option<u32>;

    /// Claim the contract with the revealed swap secret.
    fn spend_redeem(&mut self, txid: &Txid, vout: u32, secret: &[u8; 32]) -> Option<Txid>;

    /// Refund the contract through the timeout branch.
    fn spend_refund(&mut self, txid: &Txid, vout: u32) -> Option<Txid>;
}

/// Build the contract script. `redeem_key` belongs to the party claiming
/// with the secret, `refund_key` to the locker. The secret public key is
/// pushed in the serialization the foreign wallet maps it to.
pub fn htlc_script(
    redeem_key: &PublicKey,
    refund_key: &PublicKey,
    secret_pubkey: &[u8],
    lock_time: Timestamp,
) -> Script {
    Builder::new()
        .push_opcode(opcodes::OP_IF)
        .push_key(redeem_key)
        .push_opcode(opcodes::OP_CHECKSIGVERIFY)
        .push_slice(secret_pubkey)
        .push_opcode(opcodes::OP_CHECKSIG)
        .push_opcode(opcodes::OP_ELSE)
        .push_int(lock_time as i64)
        .push_opcode(opcodes::OP_CLTV)
        .push_opcode(opcodes::OP_DROP)
        .push_key(refund_key)
        .push_opcode(opcodes::OP_CHECKSIG)
        .push_opcode(opcodes::OP_ENDIF)
        .into_script()
}

/// The Bitcoin-family side of a swap.
pub struct BitcoinSide<C: BitcoinClient> {
    client: C,
    is_native_side: bool,
}

impl<C: BitcoinClient> BitcoinSide<C> {
    pub fn new(client: C, is_native_side: bool) -> Self {
        BitcoinSide {
            client,
            is_native_side,
        }
    }

    fn lock_time(&self, store: &ParameterStore) -> Option<Timestamp> {
        store.get::<Timestamp>(ParameterId::AtomicSwapExternalLockTime)
    }

    /// The contract script from this party's point of view. The native side
    /// is the claimer, the foreign side the locker.
    fn contract_script(&self, store: &ParameterStore) -> Option<Script> {
        let own = PublicKey::from_str(&store.get::<String>(ParameterId::AtomicSwapPublicKey)?).ok()?;
        // The locker's key travels with the external tx details, scoped to
        // the foreign lock partition.
        let peer_key = store
            .get::<String>(ParameterId::AtomicSwapPeerPublicKey)
            .or_else(|| {
                store.get_sub::<String>(
                    ParameterId::AtomicSwapPeerPublicKey,
                    SubTxId::ForeignLockTx,
                )
            })?;
        let peer = PublicKey::from_str(&peer_key).ok()?;
        let (redeem_key, refund_key) = if self.is_native_side {
            (own, peer)
        } else {
            (peer, own)
        };
        let secret = store
            .get_sub::<Point>(ParameterId::AtomicSwapSecretPublicKey, SubTxId::NativeRedeemTx)?;
        let lock_time = self.lock_time(store)?;
        Some(htlc_script(
            &redeem_key,
            &refund_key,
            &secret.compress().to_bytes(),
            lock_time,
        ))
    }

    fn lock_txid(&self, store: &ParameterStore) -> Option<(Txid, u32)> {
        let txid = Txid::from_str(
            &store.get_sub::<String>(ParameterId::AtomicSwapExternalTxId, SubTxId::ForeignLockTx)?,
        )
        .ok()?;
        let vout = store.get_sub::<u32>(
            ParameterId::AtomicSwapExternalTxOutputIndex,
            SubTxId::ForeignLockTx,
        )?;
        Some((txid, vout))
    }

    fn send_withdraw(&mut self, store: &mut ParameterStore, sub_tx: SubTxId) -> bool {
        if store
            .get_sub::<String>(ParameterId::AtomicSwapExternalTxId, sub_tx)
            .is_some()
        {
            return true;
        }
        let (txid, vout) = match self.lock_txid(store) {
            Some(outpoint) => outpoint,
            None => return false,
        };
        let sent = match sub_tx {
            SubTxId::ForeignRedeemTx => {
                let secret = match store
                    .get_sub::<Scalar>(ParameterId::AtomicSwapSecretPrivateKey, SubTxId::NativeRedeemTx)
                {
                    Some(secret) => secret,
                    None => return false,
                };
                self.client.spend_redeem(&txid, vout, &secret.to_bytes())
            }
            _ => self.client.spend_refund(&txid, vout),
        };
        match sent {
            Some(txid) => {
                store.set_sub(ParameterId::AtomicSwapExternalTxId, txid.to_string(), sub_tx);
                true
            }
            None => false,
        }
    }

    fn confirm_withdraw(&self, store: &ParameterStore, sub_tx: SubTxId) -> bool {
        let txid = match store.get_sub::<String>(ParameterId::AtomicSwapExternalTxId, sub_tx) {
            Some(txid) => txid,
            None => return false,
        };
        let txid = match Txid::from_str(&txid) {
            Ok(txid) => txid,
            Err(_) => return false,
        };
        matches!(self.client.confirmations(&txid), Some(depth) if depth >= WITHDRAW_TX_CONFIRMATIONS)
    }
}

impl<C: BitcoinClient> SecondSide for BitcoinSide<C> {
    fn initialize(&mut self, store: &mut ParameterStore) -> Result<bool, crate::Error> {
        if store.get::<String>(ParameterId::AtomicSwapPublicKey).is_none() {
            store.set(
                ParameterId::AtomicSwapPublicKey,
                self.client.local_public_key(),
            );
        }
        // Complete once the peer's foreign public key has arrived.
        Ok(store
            .get::<String>(ParameterId::AtomicSwapPeerPublicKey)
            .is_some())
    }

    fn init_lock_time(&mut self, store: &mut ParameterStore) -> Result<(), crate::Error> {
        if self.lock_time(store).is_none() {
            let now = self
                .client
                .median_time()
                .ok_or(crate::side::Error::Uninitialized)?;
            store.set(
                ParameterId::AtomicSwapExternalLockTime,
                now + FOREIGN_LOCK_TIME_SECS,
            );
        }
        Ok(())
    }

    fn validate_lock_time(&self, store: &ParameterStore) -> bool {
        match (self.lock_time(store), self.client.median_time()) {
            (Some(lock_time), Some(now)) => {
                lock_time > now + MIN_LOCK_MARGIN_SECS
                    && lock_time <= now + 2 * FOREIGN_LOCK_TIME_SECS
            }
            _ => false,
        }
    }

    fn has_enough_time_to_process_lock_tx(&self, store: &ParameterStore) -> bool {
        match (self.lock_time(store), self.client.median_time()) {
            (Some(lock_time), Some(now)) => now + MIN_LOCK_MARGIN_SECS < lock_time,
            _ => false,
        }
    }

    fn send_lock_tx(&mut self, store: &mut ParameterStore) -> bool {
        if self.lock_txid(store).is_some() {
            return true;
        }
        let script = match self.contract_script(store) {
            Some(script) => script,
            None => return false,
        };
        let amount = match store.get::<Amount>(ParameterId::AtomicSwapAmount) {
            Some(amount) => amount,
            None => return false,
        };
        match self.client.fund_htlc(amount, &script) {
            Some((txid, vout)) => {
                store.set_sub(
                    ParameterId::AtomicSwapExternalTxId,
                    txid.to_string(),
                    SubTxId::ForeignLockTx,
                );
                store.set_sub(
                    ParameterId::AtomicSwapExternalTxOutputIndex,
                    vout,
                    SubTxId::ForeignLockTx,
                );
                true
            }
            None => false,
        }
    }

    fn confirm_lock_tx(&mut self, store: &mut ParameterStore) -> bool {
        let (txid, vout) = match self.lock_txid(store) {
            Some(outpoint) => outpoint,
            None => return false,
        };

        // The native side accepts the contract only if the on-chain output
        // carries the agreed amount and the exact script it derived itself,
        // secret public key included.
        if self.is_native_side {
            let (amount, script) = match self.client.htlc_output(&txid, vout) {
                Some(output) => output,
                None => return false,
            };
            let expected_amount = match store.get::<Amount>(ParameterId::AtomicSwapAmount) {
                Some(amount) => amount,
                None => return false,
            };
            let expected_script = match self.contract_script(store) {
                Some(script) => script,
                None => return false,
            };
            if amount != expected_amount || script != expected_script {
                log::error!("foreign lock contract does not match the agreed swap terms");
                return false;
            }
        }

        matches!(self.client.confirmations(&txid), Some(depth) if depth >= LOCK_TX_CONFIRMATIONS)
    }

    fn is_lock_time_expired(&self, store: &ParameterStore) -> bool {
        match (self.lock_time(store), self.client.median_time()) {
            (Some(lock_time), Some(now)) => now > lock_time,
            _ => false,
        }
    }

    fn send_refund(&mut self, store: &mut ParameterStore) -> bool {
        self.send_withdraw(store, SubTxId::ForeignRefundTx)
    }

    fn confirm_refund_tx(&mut self, store: &mut ParameterStore) -> bool {
        self.confirm_withdraw(store, SubTxId::ForeignRefundTx)
    }

    fn send_redeem(&mut self, store: &mut ParameterStore) -> bool {
        self.send_withdraw(store, SubTxId::ForeignRedeemTx)
    }

    fn confirm_redeem_tx(&mut self, store: &mut ParameterStore) -> bool {
        self.confirm_withdraw(store, SubTxId::ForeignRedeemTx)
    }

    fn add_tx_details(&self, store: &ParameterStore, msg: &mut Message) {
        if let Some(own_key) = store.get::<String>(ParameterId::AtomicSwapPublicKey) {
            msg.add(ParameterId::AtomicSwapPeerPublicKey, own_key);
        }
        if let Some((txid, vout)) = self.lock_txid(store) {
            msg.add(ParameterId::AtomicSwapExternalTxId, txid.to_string());
            msg.add(ParameterId::AtomicSwapExternalTxOutputIndex, vout);
        }
    }
}

/// Factory handing out [`BitcoinSide`] adapters over a cloneable client.
pub struct BitcoinSideFactory<C: BitcoinClient + Clone + 'static> {
    client: C,
}

impl<C: BitcoinClient + Clone + 'static> BitcoinSideFactory<C> {
    pub fn new(client: C) -> Self {
        BitcoinSideFactory { client }
    }
}

impl<C: BitcoinClient + Clone + 'static> SecondSideFactory for BitcoinSideFactory<C> {
    fn create_second_side(
        &self,
        _store: &ParameterStore,
        is_native_side: bool,
    ) -> Box<dyn SecondSide> {
        Box::new(BitcoinSide::new(self.client.clone(), is_native_side))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::random_scalar;
    use bitcoin::hashes::Hash;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use std::collections::HashMap;

    const KEY_A: &str = "0339a36013301597daef41fbe593a02cc513d0b55527ec2df1050e2e8ff49c85c2";
    const KEY_B: &str = "02e493dbf1c10d80f3581e4904930b1404cc6c13900ee0758474fa94abe8c4cd13";

    #[derive(Clone)]
    struct MockClient {
        key: String,
        now: Timestamp,
        utxos: HashMap<Txid, (Amount, Script)>,
        depth: u32,
        next: u8,
    }

    impl MockClient {
        fn new(key: &str, now: Timestamp) -> Self {
            MockClient {
                key: key.into(),
                now,
                utxos: HashMap::new(),
                depth: LOCK_TX_CONFIRMATIONS,
                next: 0,
            }
        }

        fn new_txid(&mut self) -> Txid {
            self.next += 1;
            Txid::from_slice(&[self.next; 32]).unwrap()
        }
    }

    impl BitcoinClient for MockClient {
        fn local_public_key(&self) -> String {
            self.key.clone()
        }

        fn median_time(&self) -> Option<Timestamp> {
            Some(self.now)
        }

        fn fund_htlc(&mut self, amount: Amount, script: &Script) -> Option<(Txid, u32)> {
            let txid = self.new_txid();
            self.utxos.insert(txid, (amount, script.clone()));
            Some((txid, 0))
        }

        fn htlc_output(&self, txid: &Txid, _vout: u32) -> Option<(Amount, Script)> {
            self.utxos.get(txid).cloned()
        }

        fn confirmations(&self, _txid: &Txid) -> Option<u32> {
            Some(self.depth)
        }

        fn spend_redeem(&mut self, _txid: &Txid, _vout: u32, _secret: &[u8; 32]) -> Option<Txid> {
            Some(self.new_txid())
        }

        fn spend_refund(&mut self, _txid: &Txid, _vout: u32) -> Option<Txid> {
            Some(self.new_txid())
        }
    }

    fn seeded_store() -> ParameterStore {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let mut store = ParameterStore::new();
        store.set(ParameterId::AtomicSwapAmount, 50_000u64);
        store.set(ParameterId::AtomicSwapPublicKey, KEY_A.to_string());
        store.set(ParameterId::AtomicSwapPeerPublicKey, KEY_B.to_string());
        store.set_sub(
            ParameterId::AtomicSwapSecretPublicKey,
            random_scalar(&mut rng) * crate::crypto::blinding_generator(),
            SubTxId::NativeRedeemTx,
        );
        store
    }

    #[test]
    fn lock_time_policy() {
        let mut store = seeded_store();
        let mut side = BitcoinSide::new(MockClient::new(KEY_A, 1_000_000), false);
        side.init_lock_time(&mut store).unwrap();
        assert_eq!(
            store.get::<Timestamp>(ParameterId::AtomicSwapExternalLockTime),
            Some(1_000_000 + FOREIGN_LOCK_TIME_SECS)
        );

        let responder = BitcoinSide::new(MockClient::new(KEY_B, 1_000_000), true);
        assert!(responder.validate_lock_time(&store));

        // A lock time in the past is expired, not acceptable.
        let late = BitcoinSide::new(
            MockClient::new(KEY_B, 1_000_000 + 2 * FOREIGN_LOCK_TIME_SECS),
            true,
        );
        assert!(!late.validate_lock_time(&store));
        assert!(late.is_lock_time_expired(&store));
    }

    #[test]
    fn lock_send_and_confirm_roundtrip() {
        let mut store = seeded_store();
        store.set(
            ParameterId::AtomicSwapExternalLockTime,
            1_000_000 + FOREIGN_LOCK_TIME_SECS,
        );

        let client = MockClient::new(KEY_A, 1_000_000);
        let mut locker = BitcoinSide::new(client.clone(), false);
        assert!(locker.send_lock_tx(&mut store));
        assert!(store
            .get_sub::<String>(ParameterId::AtomicSwapExternalTxId, SubTxId::ForeignLockTx)
            .is_some());

        // The native side validates the same script against the chain.
        let mut shared = locker.client.clone();
        shared.key = KEY_B.into();
        let mut claimer = BitcoinSide::new(shared, true);
        // Swap perspective: own key and peer key trade places.
        store.set(ParameterId::AtomicSwapPublicKey, KEY_B.to_string());
        store.set(ParameterId::AtomicSwapPeerPublicKey, KEY_A.to_string());
        assert!(claimer.confirm_lock_tx(&mut store));
    }

    #[test]
    fn tampered_contract_is_rejected() {
        let mut store = seeded_store();
        store.set(
            ParameterId::AtomicSwapExternalLockTime,
            1_000_000 + FOREIGN_LOCK_TIME_SECS,
        );

        let mut locker = BitcoinSide::new(MockClient::new(KEY_A, 1_000_000), false);
        assert!(locker.send_lock_tx(&mut store));

        // Change the secret point after the lock went out: the claimer's
        // expected script no longer matches what is on-chain.
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        store.set_sub(
            ParameterId::AtomicSwapSecretPublicKey,
            random_scalar(&mut rng) * crate::crypto::blinding_generator(),
            SubTxId::NativeRedeemTx,
        );
        let mut shared = locker.client.clone();
        shared.key = KEY_B.into();
        let mut claimer = BitcoinSide::new(shared, true);
        store.set(ParameterId::AtomicSwapPublicKey, KEY_B.to_string());
        store.set(ParameterId::AtomicSwapPeerPublicKey, KEY_A.to_string());
        assert!(!claimer.confirm_lock_tx(&mut store));
    }
}
