#[macro_use]
extern crate criterion;
use criterion::Criterion;

use zkat_token::issue::Issuer;
use zkat_token::keys;
use zkat_token::ledger::{Ledger, MemoryLedger};
use zkat_token::signing::{SchnorrSigner, Signer};
use zkat_token::transfer::{Sender, SenderInput};
use zkat_token::{apply_token_request, OutputSpec, PublicParams, Token, TokenRequest, Validator};

fn bench_transfer(c: &mut Criterion) {
    let mut group = c.benchmark_group("TokenRequest");
    let mut rng = rand::thread_rng();
    let pp = PublicParams::setup(100, 2, &mut rng).unwrap();
    let validator = Validator::new(pp.clone(), "zkat").unwrap();
    let alice = SchnorrSigner::generate(&mut rng);
    let issuer = Issuer::Plain(SchnorrSigner::generate(&mut rng));

    let outputs = [
        OutputSpec::new("ABC", 70, &alice.identity()),
        OutputSpec::new("ABC", 30, &alice.identity()),
    ];
    let (action, metadata, signer) = issuer.generate_issue(&outputs, &pp, &mut rng).unwrap();
    let mut request = TokenRequest::new();
    request.add_issue(&action).unwrap();
    let message = request.message_to_sign("1").unwrap();
    request.signatures.push(signer.sign(&message).unwrap());
    let mut ledger = MemoryLedger::new();
    apply_token_request(&validator, &mut ledger, "1", &request.to_bytes().unwrap()).unwrap();

    let inputs = (0..2u64)
        .map(|i| {
            let key = keys::token_key("1", i).unwrap();
            let stored = ledger.get_state("zkat", &key).unwrap().unwrap();
            let token = Token::from_bytes(&stored).unwrap();
            SenderInput {
                key,
                token,
                opening: metadata.outputs[i as usize].clone(),
                signer: &alice,
            }
        })
        .collect();
    let sender = Sender::new(inputs);
    let outputs = [
        OutputSpec::new("ABC", 65, b"bob"),
        OutputSpec::new("ABC", 35, &alice.identity()),
    ];

    group.bench_function("generate_transfer", |b| {
        b.iter(|| sender.generate_transfer(&outputs, &pp, &mut rand::thread_rng()).unwrap())
    });

    let (action, _) = sender.generate_transfer(&outputs, &pp, &mut rng).unwrap();
    let mut request = TokenRequest::new();
    request.add_transfer(&action).unwrap();
    let message = request.message_to_sign("2").unwrap();
    request.signatures = sender.sign_token_actions(&message).unwrap();
    group.bench_function("verify_transfer", |b| {
        b.iter(|| validator.verify_token_request(&ledger, "2", &request).unwrap())
    });
    group.finish()
}

criterion_group! {
    name = request_benches;
    config = Criterion::default().sample_size(10);
    targets = bench_transfer
}

criterion_main!(request_benches);
