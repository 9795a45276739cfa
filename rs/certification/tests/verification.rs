use assert_matches::assert_matches;
use ic_agent_certification::{Certificate, CertificateError, Delegation, HashTree};
use ic_agent_certification_test_utils::{
    canister_id, fork_of, request_status_tree, subnet_id, CertificateBuilder, CertificateData,
    CertificateData::{CustomTree, SubnetData},
};

fn state_tree() -> HashTree {
    fork_of(vec![
        request_status_tree(&[1; 32], vec![("status", b"replied".to_vec()), ("reply", b"hello".to_vec())]),
        HashTree::labeled("time", HashTree::leaf(vec![0xa1, 0x2b])),
    ])
}

fn subnet_data() -> CertificateData {
    SubnetData {
        subnet_id: subnet_id(123),
        canister_id_ranges: vec![(canister_id(0), canister_id(10)), (canister_id(20), canister_id(30))],
    }
}

#[test]
fn verifies_certificate_signed_by_root_key() {
    let (_, root_key, cbor) = CertificateBuilder::new_with_seed(CustomTree(state_tree()), 7).build();

    let mut certificate = Certificate::from_cbor(&cbor).unwrap();
    assert_eq!(certificate.lookup(&["time"]), Err(CertificateError::NotVerified));

    certificate.verify(&root_key, &canister_id(1)).unwrap();
    assert!(certificate.is_verified());
    assert_eq!(certificate.lookup(&["time"]).unwrap(), &[0xa1, 0x2b]);
    assert_eq!(
        certificate
            .lookup(&[b"request_status".as_slice(), &[1; 32], b"reply".as_slice()])
            .unwrap(),
        b"hello"
    );
}

#[test]
fn certificate_with_invalid_signature_is_rejected() {
    let (_, root_key, cbor) = CertificateBuilder::new(CustomTree(state_tree()))
        .with_invalid_signature()
        .build();

    let mut certificate = Certificate::from_cbor(&cbor).unwrap();
    assert_matches!(
        certificate.verify(&root_key, &canister_id(1)),
        Err(CertificateError::InvalidSignature(_))
    );
    assert_eq!(certificate.lookup(&["time"]), Err(CertificateError::NotVerified));
}

#[test]
fn certificate_is_rejected_under_other_root_key() {
    let (mut certificate, _, _) = CertificateBuilder::new_with_seed(CustomTree(state_tree()), 7).build();
    let other_root_key = CertificateBuilder::new_with_seed(CustomTree(HashTree::Empty), 8).public_key_der();

    assert_matches!(
        certificate.verify(&other_root_key, &canister_id(1)),
        Err(CertificateError::InvalidSignature(_))
    );
}

#[test]
fn tampered_tree_is_rejected() {
    let (certificate, root_key, _) = CertificateBuilder::new(CustomTree(state_tree())).build();
    let tampered_tree = fork_of(vec![
        request_status_tree(&[1; 32], vec![("status", b"rejected".to_vec())]),
        HashTree::labeled("time", HashTree::leaf(vec![0xa1, 0x2b])),
    ]);
    let mut tampered = Certificate::new(
        tampered_tree,
        certificate.signature().to_vec(),
        None,
    );

    assert_matches!(
        tampered.verify(&root_key, &canister_id(1)),
        Err(CertificateError::InvalidSignature(_))
    );
}

#[test]
fn malformed_root_key_is_rejected() {
    let (mut certificate, root_key, _) = CertificateBuilder::new(CustomTree(state_tree())).build();
    assert_matches!(
        certificate.verify(&root_key[1..], &canister_id(1)),
        Err(CertificateError::MalformedPublicKey(_))
    );
}

#[test]
fn verifies_delegated_certificate_for_canister_in_range() {
    let builder = CertificateBuilder::new(CustomTree(state_tree()))
        .with_delegation(CertificateBuilder::new(subnet_data()));
    let (_, root_key, cbor) = builder.build();

    let mut certificate = Certificate::from_cbor(&cbor).unwrap();
    let delegation = certificate.delegation().unwrap();
    assert_eq!(delegation.subnet_id, subnet_id(123).as_slice());

    for canister in [canister_id(0), canister_id(5), canister_id(10), canister_id(25)] {
        certificate.verify(&root_key, &canister).unwrap();
    }
    assert_eq!(certificate.lookup(&["time"]).unwrap(), &[0xa1, 0x2b]);
}

#[test]
fn delegated_certificate_for_canister_out_of_range_is_rejected() {
    let (mut certificate, root_key, _) = CertificateBuilder::new(CustomTree(state_tree()))
        .with_delegation(CertificateBuilder::new(subnet_data()))
        .build();

    assert_matches!(
        certificate.verify(&root_key, &canister_id(11)),
        Err(CertificateError::InvalidDelegation(msg)) if msg.contains("not in the ranges")
    );
    assert!(!certificate.is_verified());
}

#[test]
fn delegation_with_invalid_signature_is_rejected() {
    let (mut certificate, root_key, _) = CertificateBuilder::new(CustomTree(state_tree()))
        .with_delegation(CertificateBuilder::new(subnet_data()).with_invalid_signature())
        .build();

    assert_matches!(
        certificate.verify(&root_key, &canister_id(1)),
        Err(CertificateError::InvalidDelegation(_))
    );
}

#[test]
fn delegated_certificate_must_be_signed_by_subnet_key() {
    let (mut certificate, root_key, _) = CertificateBuilder::new(CustomTree(state_tree()))
        .with_delegation(CertificateBuilder::new(subnet_data()))
        .build();
    let (other, _, _) = CertificateBuilder::new(CustomTree(state_tree())).build();
    let mut forged = Certificate::new(
        certificate.tree().clone(),
        other.signature().to_vec(),
        certificate.delegation().cloned(),
    );

    assert_matches!(
        forged.verify(&root_key, &canister_id(1)),
        Err(CertificateError::InvalidSignature(_))
    );
    certificate.verify(&root_key, &canister_id(1)).unwrap();
}

#[test]
fn nested_delegations_are_rejected() {
    let (_, root_key, delegated_cbor) = CertificateBuilder::new(CustomTree(HashTree::Empty))
        .with_delegation(CertificateBuilder::new(subnet_data()))
        .build();
    let mut certificate = Certificate::new(
        state_tree(),
        vec![0; 48],
        Some(Delegation {
            subnet_id: subnet_id(123).as_slice().to_vec(),
            certificate: delegated_cbor,
        }),
    );

    assert_matches!(
        certificate.verify(&root_key, &canister_id(1)),
        Err(CertificateError::InvalidDelegation(msg)) if msg.contains("must not be delegated")
    );
}

#[test]
fn delegation_without_subnet_entry_is_rejected() {
    let (mut certificate, root_key, _) = CertificateBuilder::new(CustomTree(state_tree()))
        .with_delegation(CertificateBuilder::new(subnet_data()))
        .build();
    let mut delegation = certificate.delegation().cloned().unwrap();
    delegation.subnet_id = subnet_id(124).as_slice().to_vec();
    let mut wrong_subnet = Certificate::new(
        certificate.tree().clone(),
        certificate.signature().to_vec(),
        Some(delegation),
    );

    assert_matches!(
        wrong_subnet.verify(&root_key, &canister_id(1)),
        Err(CertificateError::InvalidDelegation(_))
    );
    certificate.verify(&root_key, &canister_id(1)).unwrap();
}
