#![allow(clippy::unwrap_used)]
// End-to-end tests for `Controller` against a real on-disk store.

use std::net::Ipv4Addr;

use secrecy::SecretString;
use tempfile::TempDir;

use wgnet_core::{
    ARecord, CnameRecord, Command, CommandResult, Controller, CoreError, CreateDeviceRequest,
    CreateUserRequest, DeviceSummary, DnsRecord, OtpVerifier, RequestContext, ServiceConfig,
    Store, UpdateDeviceRequest, UserId,
};

// ── Helpers ─────────────────────────────────────────────────────────

/// Accepts one fixed code for any secret.
struct FixedCode(&'static str);

impl OtpVerifier for FixedCode {
    fn verify(&self, secret: &str, code: &str) -> bool {
        !secret.is_empty() && code == self.0
    }
}

const CODE: FixedCode = FixedCode("424242");

fn config(tunnel: &str, auth_required: bool) -> ServiceConfig {
    ServiceConfig {
        tunnel_inet: tunnel.parse().unwrap(),
        endpoint_host: Some("vpn.example.net".into()),
        auth_required,
        session_secret: SecretString::from("integration-secret".to_owned()),
        ..ServiceConfig::default()
    }
}

/// An ungated controller for setup and a gated one over the same store.
fn setup(tunnel: &str) -> (TempDir, Controller, Controller) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path().join("wgnet.redb")).unwrap();
    let admin = Controller::new(config(tunnel, false), store.clone()).unwrap();
    let gated = Controller::new(config(tunnel, true), store).unwrap();
    (dir, admin, gated)
}

fn admin_ctx() -> RequestContext {
    RequestContext::new("127.0.0.1", None)
}

fn ctx(source: &str, token: &str) -> RequestContext {
    RequestContext::new(source, Some(token.to_owned()))
}

fn create_user(admin: &Controller, name: &str, is_manager: bool) -> UserId {
    let response = admin
        .execute(
            &admin_ctx(),
            Command::CreateUser(CreateUserRequest {
                name: name.into(),
                is_manager,
            }),
        )
        .unwrap();
    match response.result {
        CommandResult::UserChanged { user, otp } => {
            assert_eq!(otp.is_some(), is_manager);
            user.id
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

fn create_device(
    admin: &Controller,
    owner: UserId,
    wan_forward: bool,
) -> Result<DeviceSummary, CoreError> {
    let response = admin.execute(
        &admin_ctx(),
        Command::CreateDevice(CreateDeviceRequest {
            owner,
            label: "device".into(),
            wan_forward,
            public_key: None,
        }),
    )?;
    match response.result {
        CommandResult::DeviceCreated {
            device,
            private_key,
            ..
        } => {
            assert!(private_key.is_some());
            Ok(device)
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

fn is_unauthorized<T>(result: &Result<T, CoreError>) -> bool {
    matches!(result, Err(CoreError::Unauthorized { .. }))
}

// ── Identity gate ───────────────────────────────────────────────────

#[test]
fn token_only_works_from_the_owners_devices() {
    let (_dir, admin, gated) = setup("10.0.0.1/24");
    let manager = create_user(&admin, "ann", true);
    let other = create_user(&admin, "bob", false);

    let addresses: Vec<Ipv4Addr> = (0..6)
        .map(|_| create_device(&admin, manager, false).unwrap().address)
        .collect();
    assert_eq!(addresses.last(), Some(&Ipv4Addr::new(10, 0, 0, 7)));

    let grant = gated.sign_in("10.0.0.7", "424242", &CODE).unwrap();

    let response = gated
        .execute(&ctx("10.0.0.7", &grant.token), Command::ListUsers)
        .unwrap();
    assert_eq!(response.session.as_deref(), Some(grant.token.as_str()));

    admin
        .execute(
            &admin_ctx(),
            Command::UpdateDevice {
                address: Ipv4Addr::new(10, 0, 0, 7),
                update: UpdateDeviceRequest {
                    owner: Some(other),
                    ..UpdateDeviceRequest::default()
                },
            },
        )
        .unwrap();

    let moved = gated.execute(&ctx("10.0.0.7", &grant.token), Command::ListUsers);
    assert!(is_unauthorized(&moved));

    let still_owned = gated.execute(&ctx("10.0.0.2", &grant.token), Command::ListUsers);
    assert!(still_owned.is_ok());
}

#[test]
fn rejected_mutation_writes_nothing() {
    let (_dir, admin, gated) = setup("10.0.0.1/24");
    let result = gated.execute(
        &ctx("10.0.0.2", "forged"),
        Command::CreateDomain {
            name: "host.lan".into(),
        },
    );
    assert!(is_unauthorized(&result));

    let domains = admin.execute(&admin_ctx(), Command::ListDomains).unwrap();
    assert!(matches!(domains.result, CommandResult::Domains(d) if d.is_empty()));
}

#[test]
fn sign_in_requires_manager_and_code() {
    let (_dir, admin, gated) = setup("10.0.0.1/24");
    let plain = create_user(&admin, "bob", false);
    let manager = create_user(&admin, "ann", true);
    create_device(&admin, plain, false).unwrap();
    create_device(&admin, manager, false).unwrap();

    assert!(is_unauthorized(&gated.sign_in("10.0.0.2", "424242", &CODE)));
    assert!(is_unauthorized(&gated.sign_in("10.0.0.3", "000000", &CODE)));
    assert!(is_unauthorized(&gated.sign_in("10.0.0.9", "424242", &CODE)));
    assert!(gated.sign_in("10.0.0.3", "424242", &CODE).is_ok());
}

#[test]
fn check_session_prolongs_and_sign_out_revokes() {
    let (_dir, admin, gated) = setup("10.0.0.1/24");
    let manager = create_user(&admin, "ann", true);
    create_device(&admin, manager, false).unwrap();

    let grant = gated.sign_in("10.0.0.2", "424242", &CODE).unwrap();
    let refreshed = gated.check_session(&ctx("10.0.0.2", &grant.token)).unwrap();
    assert!(refreshed.expires >= grant.expires);

    gated.sign_out(&ctx("10.0.0.2", &refreshed.token)).unwrap();
    let after = gated.execute(&ctx("10.0.0.2", &refreshed.token), Command::ListDevices);
    assert!(is_unauthorized(&after));
}

#[test]
fn gate_without_secret_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path().join("wgnet.redb")).unwrap();
    let config = ServiceConfig {
        session_secret: SecretString::from(String::new()),
        ..ServiceConfig::default()
    };
    assert!(matches!(
        Controller::new(config, store),
        Err(CoreError::Validation { .. })
    ));
}

// ── Address pool ────────────────────────────────────────────────────

#[test]
fn small_pool_exhausts_then_reuses_freed_address() {
    let (_dir, admin, _) = setup("10.9.0.1/29");
    let owner = create_user(&admin, "ann", false);

    let addresses: Vec<Ipv4Addr> = (0..5)
        .map(|_| create_device(&admin, owner, false).unwrap().address)
        .collect();
    assert_eq!(addresses.first(), Some(&Ipv4Addr::new(10, 9, 0, 2)));
    assert_eq!(addresses.last(), Some(&Ipv4Addr::new(10, 9, 0, 6)));

    let exhausted = create_device(&admin, owner, false);
    assert!(matches!(exhausted, Err(CoreError::PoolExhausted { .. })));

    let user = admin
        .execute(&admin_ctx(), Command::GetUser { id: owner })
        .unwrap();
    let CommandResult::User(user) = user.result else {
        panic!("expected a user");
    };
    assert_eq!(user.devices.len(), 5);

    admin
        .execute(
            &admin_ctx(),
            Command::RemoveDevice {
                address: Ipv4Addr::new(10, 9, 0, 3),
            },
        )
        .unwrap();
    let reused = create_device(&admin, owner, false).unwrap();
    assert_eq!(reused.address, Ipv4Addr::new(10, 9, 0, 3));
}

// ── Profiles ────────────────────────────────────────────────────────

#[test]
fn full_tunnel_profile_lists_public_space() {
    let (_dir, admin, _) = setup("10.0.0.1/24");
    let owner = create_user(&admin, "ann", false);
    let device = create_device(&admin, owner, true).unwrap();

    let response = admin
        .execute(
            &admin_ctx(),
            Command::DeviceProfile {
                address: device.address,
            },
        )
        .unwrap();
    let CommandResult::Profile(profile) = response.result else {
        panic!("expected a profile");
    };

    assert_eq!(profile.allowed_ips.len(), 33);
    assert_eq!(profile.allowed_ips[0], "10.0.0.0/24".parse().unwrap());
    assert_eq!(profile.dns, Ipv4Addr::new(10, 0, 0, 1));

    let text = profile.render(None);
    assert!(text.contains("Endpoint = vpn.example.net:51820"));
    assert!(text.contains("PrivateKey = <PLACEHOLDER>"));
}

#[test]
fn server_info_reflects_config() {
    let (_dir, admin, _) = setup("10.0.0.1/24");
    let response = admin.execute(&admin_ctx(), Command::ServerInfo).unwrap();
    let CommandResult::Server(info) = response.result else {
        panic!("expected server info");
    };
    assert_eq!(info.listen_port, 51820);
    assert_eq!(info.endpoint.as_deref(), Some("vpn.example.net:51820"));
}

// ── DNS zone ────────────────────────────────────────────────────────

#[test]
fn zone_rejects_mixed_records_and_resolves_aliases() {
    let (_dir, admin, _) = setup("10.0.0.1/24");
    let run = |command| admin.execute(&admin_ctx(), command);

    run(Command::CreateDomain {
        name: "db.lan".into(),
    })
    .unwrap();
    run(Command::CreateDomain {
        name: "www.lan".into(),
    })
    .unwrap();
    run(Command::SetRecord {
        name: "db.lan".into(),
        record: DnsRecord::A(ARecord {
            address: Ipv4Addr::new(10, 0, 0, 5),
            ttl: 60,
        }),
    })
    .unwrap();
    run(Command::SetRecord {
        name: "www.lan".into(),
        record: DnsRecord::Cname(CnameRecord {
            target: "db.lan".into(),
            ttl: 60,
        }),
    })
    .unwrap();

    let conflict = run(Command::SetRecord {
        name: "db.lan".into(),
        record: DnsRecord::Cname(CnameRecord {
            target: "www.lan".into(),
            ttl: 60,
        }),
    });
    assert!(matches!(
        conflict,
        Err(CoreError::ConflictingRecordType { .. })
    ));

    let resolved = run(Command::ResolveDomain {
        name: "WWW.lan.".into(),
    })
    .unwrap();
    let CommandResult::Resolution(resolution) = resolved.result else {
        panic!("expected a resolution");
    };
    assert_eq!(resolution.chain, vec!["www.lan", "db.lan"]);
    assert_eq!(resolution.addresses.len(), 1);
}

// ── Trusted sources ─────────────────────────────────────────────────

#[test]
fn trust_set_add_is_idempotent() {
    let (_dir, admin, _) = setup("10.0.0.1/24");
    let address = Ipv4Addr::new(192, 0, 2, 10);

    for expected in [true, false] {
        let response = admin
            .execute(&admin_ctx(), Command::AddTrusted { address })
            .unwrap();
        assert!(matches!(
            response.result,
            CommandResult::TrustChanged { changed, .. } if changed == expected
        ));
    }

    let listed = admin.execute(&admin_ctx(), Command::ListTrusted).unwrap();
    assert!(matches!(listed.result, CommandResult::Trusted(ref a) if a == &[address]));
}
