//! End-to-end smoke test for skyward-node.
//!
//! Starts a real node process, then drives the protocol over JSON-RPC:
//! booking → code, code verification, the claim cycle, and mnemonic-driven
//! recovery. Negative paths (double-spent tokens, replayed codes, reused
//! addresses) are exercised with raw RPC calls.
//!
//! Run with:
//!   cargo test -p skyward-node --test smoke

use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use skyward_crypto::derive_address;
use skyward_wallet::Wallet;

// Standard BIP39 test vectors; one seed per scenario so chains stay apart.
const MNEMONIC_BOOKING: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
const MNEMONIC_ACCESS: &str =
    "legal winner thank year wave sausage worth useful legal winner thank yellow";
const MNEMONIC_REUSE: &str =
    "letter advice cage absurd amount doctor acoustic avoid letter advice cage above";
const MNEMONIC_CLAIM: &str = "zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo wrong";

// ── Node lifecycle ────────────────────────────────────────────────────────────

struct NodeGuard {
    child: Child,
}

impl Drop for NodeGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

// ── Raw RPC helpers ───────────────────────────────────────────────────────────

/// Call a method and return the `{data, err}` envelope as JSON.
async fn rpc_call(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1
    });
    let resp = client
        .post(url)
        .json(&body)
        .send()
        .await
        .unwrap_or_else(|e| panic!("RPC call {method} failed: {e}"));
    let json: serde_json::Value = resp.json().await.expect("parse RPC JSON");
    if let Some(err) = json.get("error") {
        panic!("JSON-RPC error from {method}: {err}");
    }
    json["result"].clone()
}

/// Poll until the RPC server responds or the timeout elapses. Startup is
/// dominated by six RSA keypair generations, so the window is generous.
async fn wait_for_rpc(client: &reqwest::Client, url: &str, timeout: Duration) -> bool {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "method": "system/info",
        "params": [],
        "id": 1
    });
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Ok(resp) = client.post(url).json(&body).send().await {
            if resp.status().is_success() {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    false
}

fn bundle_json(seed_hex: &str, account_id: u32, address_id: u32, address: &str) -> serde_json::Value {
    serde_json::json!({
        "seed": seed_hex,
        "accountID": account_id,
        "addressID": address_id,
        "address": address,
    })
}

// ── Smoke test ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn smoke_booking_claim_and_recovery() {
    // ── 1. Start node ─────────────────────────────────────────────────────────
    let port = free_port();
    let rpc_url = format!("http://127.0.0.1:{port}");

    let node_bin = env!("CARGO_BIN_EXE_skyward-node");
    let child = Command::new(node_bin)
        .args(["--port", &port.to_string(), "--mode", "release"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn skyward-node");
    let _guard = NodeGuard { child };

    let http = reqwest::Client::new();
    assert!(
        wait_for_rpc(&http, &rpc_url, Duration::from_secs(120)).await,
        "skyward-node did not become ready"
    );

    // ── 2. Booking then code; a booking token signs exactly once ──────────────
    let result = rpc_call(
        &http,
        &rpc_url,
        "booking/send",
        serde_json::json!([{ "customerID": 1, "flightID": 2, "tierID": "middle" }]),
    )
    .await;
    assert_eq!(result["err"], "");
    let token = result["data"]["token"].as_str().unwrap().to_string();
    assert!(!token.is_empty());

    let first = rpc_call(
        &http,
        &rpc_url,
        "blindSignature",
        serde_json::json!([{ "tierID": "middle", "token": token, "blindToken": "01", "action": 0 }]),
    )
    .await;
    assert_eq!(first["err"], "");
    assert!(!first["data"]["blindSignature"].as_str().unwrap().is_empty());

    let second = rpc_call(
        &http,
        &rpc_url,
        "blindSignature",
        serde_json::json!([{ "tierID": "middle", "token": token, "blindToken": "01", "action": 0 }]),
    )
    .await;
    assert_eq!(second["err"], "token is not valid");

    // ── 3. Access with unknown codes fails ────────────────────────────────────
    let seed = skyward_crypto::seed_from_mnemonic(MNEMONIC_BOOKING).unwrap();
    let address = derive_address(&seed, 0, 0).unwrap();
    let denied = rpc_call(
        &http,
        &rpc_url,
        "accessBonusSystem",
        serde_json::json!([{
            "codes": ["x", "y"],
            "adrBundle": bundle_json(&hex::encode(&seed), 0, 0, &address),
        }]),
    )
    .await;
    assert_eq!(denied["err"], "no bonus level accessible");
    assert!(denied["data"]["tokens"].as_object().unwrap().is_empty());

    // ── 4. Five high-tier codes unlock all three tiers, once ──────────────────
    let mut high_wallet = Wallet::new(&rpc_url, MNEMONIC_ACCESS, 2).unwrap();
    high_wallet.register().await.unwrap();
    high_wallet.fetch_info().await.unwrap();
    for _ in 0..5 {
        high_wallet.book(2, "high").await.unwrap();
    }
    let spent_codes = high_wallet.codes.clone();
    high_wallet.access().await.unwrap();

    assert_eq!(high_wallet.tier_tokens.len(), 3);
    assert_eq!(high_wallet.tier_recovery.len(), 3);
    let mut recoveries: Vec<&String> = high_wallet.tier_recovery.values().collect();
    recoveries.sort();
    recoveries.dedup();
    assert_eq!(recoveries.len(), 3, "recovery tokens must be distinct");

    // Replaying the spent codes fails.
    let replay_address = derive_address(
        &skyward_crypto::seed_from_mnemonic(MNEMONIC_ACCESS).unwrap(),
        high_wallet.account_id,
        high_wallet.address_id,
    )
    .unwrap();
    let replay = rpc_call(
        &http,
        &rpc_url,
        "accessBonusSystem",
        serde_json::json!([{
            "codes": spent_codes,
            "adrBundle": bundle_json(
                &hex::encode(skyward_crypto::seed_from_mnemonic(MNEMONIC_ACCESS).unwrap()),
                high_wallet.account_id,
                high_wallet.address_id,
                &replay_address,
            ),
        }]),
    )
    .await;
    assert_eq!(replay["err"], "no bonus level accessible");

    // ── 5. Address reuse is rejected ──────────────────────────────────────────
    let mut reuse_wallet = Wallet::new(&rpc_url, MNEMONIC_REUSE, 2).unwrap();
    reuse_wallet.register().await.unwrap();
    reuse_wallet.fetch_info().await.unwrap();
    for _ in 0..3 {
        reuse_wallet.book(3, "middle").await.unwrap();
    }
    reuse_wallet.access().await.unwrap();

    let (rotated_token, rotated_recovery) = reuse_wallet.address_update("middle").await.unwrap();
    let used_bundle = reuse_wallet.bundle(reuse_wallet.address_id).unwrap();

    // A fresh, valid signature does not rescue a burned address.
    let (hash, sig) = reuse_wallet
        .signature_for_token("middle", &rotated_token, skyward_core::types::Action::Claim)
        .await
        .unwrap();
    let pkr = reuse_wallet.pkr(&rotated_recovery).unwrap();
    let rejected = rpc_call(
        &http,
        &rpc_url,
        "setAddress",
        serde_json::json!([{
            "tierID": "middle",
            "hashValue": hex::encode(&hash),
            "signature": hex::encode(&sig),
            "adrBundle": {
                "seed": hex::encode(&used_bundle.seed),
                "accountID": used_bundle.account_id,
                "addressID": used_bundle.address_id,
                "address": used_bundle.address,
            },
            "action": 1,
            "pkr": pkr,
        }]),
    )
    .await;
    assert_eq!(rejected["err"], "address is not valid. Already used");

    // ── 6. Claim, forget everything, recover from the mnemonic ────────────────
    let mut claim_wallet = Wallet::new(&rpc_url, MNEMONIC_CLAIM, 2).unwrap();
    claim_wallet.register().await.unwrap();
    claim_wallet.fetch_info().await.unwrap();
    for _ in 0..3 {
        claim_wallet.book(4, "middle").await.unwrap();
    }
    claim_wallet.access().await.unwrap();
    let bonus_data = claim_wallet.claim("middle").await.unwrap();
    assert!(bonus_data.starts_with("middle"));
    drop(claim_wallet); // the client forgets its tokens

    let mut restored = Wallet::new(&rpc_url, MNEMONIC_CLAIM, 2).unwrap();
    let recovered = restored.restore_all().await.unwrap();
    assert_eq!(
        recovered.get("middle").map(String::as_str),
        Some(bonus_data.as_str()),
        "recovery must reproduce the claimed bonus data"
    );
    // The access-only low-tier chain restores too, with no payload yet.
    assert_eq!(recovered.get("low").map(String::as_str), Some(""));
    assert!(restored.tier_tokens.contains_key("middle"));
    assert!(restored.tier_recovery.contains_key("middle"));

    // ── 7. Statistics saw the traffic ─────────────────────────────────────────
    let stats = rpc_call(&http, &rpc_url, "system/statistic", serde_json::json!([])).await;
    assert_eq!(stats["err"], "");
    assert!(stats["data"]["counters"]["accessBonusSystem"].as_u64().unwrap() >= 3);
    assert!(stats["data"]["tiers"]["middle"].as_array().unwrap().len() == 2);
}
