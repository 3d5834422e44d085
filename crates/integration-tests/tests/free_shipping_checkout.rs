//! End-to-end free shipping: rules saved through the admin service price the
//! quotes a storefront cart receives.

#![allow(clippy::unwrap_used)]

use atelie_admin::backend::HttpProviderConfigStore;
use atelie_admin::routes;
use atelie_admin::state::AppState;
use atelie_core::ProductId;
use atelie_core::shipping::CarrierQuote;
use atelie_integration_tests::{ADMIN_TOKEN, FakeBackend, PROVIDER_CONFIG_PATH, TENANT_ID, serve};
use atelie_storefront::api::{ApiClient, ShippingOption};
use atelie_storefront::cart::{CartItem, CartService, quote_lines, subtotal};
use atelie_storefront::config::StorefrontConfig;
use atelie_storefront::events::EventBus;
use atelie_storefront::session::SessionStore;
use atelie_storefront::storage::LocalStorage;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::json;
use tempfile::TempDir;

fn carrier(name: &str, price: i64, days: u32) -> CarrierQuote {
    CarrierQuote {
        name: name.to_string(),
        price: Some(Decimal::new(price, 2)),
        delivery_days: Some(days),
        error: None,
    }
}

fn carrier_quotes() -> Vec<CarrierQuote> {
    vec![
        carrier("PAC", 2590, 8),
        carrier("SEDEX", 4150, 3),
        carrier("Loggi", 1990, 2),
        CarrierQuote {
            name: "Jadlog .Package".into(),
            price: None,
            delivery_days: None,
            error: Some("Serviço indisponível para o trecho".into()),
        },
    ]
}

/// Configure free shipping through the admin API, the way the dashboard does.
async fn configure(backend: &FakeBackend) {
    let store = HttpProviderConfigStore::with_endpoint(
        &format!("{}{PROVIDER_CONFIG_PATH}", backend.api_url()),
        &SecretString::from(ADMIN_TOKEN.to_string()),
        TENANT_ID,
    )
    .unwrap();
    let addr = serve(routes::routes().with_state(AppState::new(store)))
        .await
        .unwrap();

    let draft = json!({
        "token": "me-live-9a8b7c6d5e4f",
        "zipCode": "01001000",
        "allowedCarriers": ["PAC", "SEDEX", "Jadlog .Package"],
        "rules": [
            {"name": "Capital SP", "state": "SP", "minAmount": "200"},
            {"name": "Pedidos grandes", "state": "ALL", "minAmount": "800"}
        ]
    });
    let response = reqwest::Client::new()
        .put(format!("http://{addr}/api/shipping/melhor-envio"))
        .json(&draft)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
}

async fn storefront(backend: &FakeBackend, dir: &TempDir) -> ApiClient {
    let session = SessionStore::load(LocalStorage::new(dir.path()), EventBus::new()).await;
    let config = StorefrontConfig::new(backend.api_url().parse().unwrap());
    ApiClient::new(&config, session).unwrap()
}

fn line(price: i64, quantity: u32) -> CartItem {
    CartItem {
        id: ProductId::random(),
        name: "Guia de Oxalá".into(),
        price: Decimal::new(price, 2),
        image: None,
        quantity,
        variant_id: None,
    }
}

fn by_provider<'a>(options: &'a [ShippingOption], provider: &str) -> &'a ShippingOption {
    options.iter().find(|o| o.provider == provider).unwrap()
}

#[tokio::test]
async fn test_cart_over_threshold_ships_free_to_matching_region() {
    let backend = FakeBackend::start(carrier_quotes()).await.unwrap();
    configure(&backend).await;
    let dir = tempfile::tempdir().unwrap();
    let api = storefront(&backend, &dir).await;

    let cart = CartService::new(api.clone());
    cart.save(&[line(12500, 2)]).await.unwrap();
    let items = cart.get().await.unwrap();
    assert_eq!(subtotal(&items), Decimal::new(250, 0));

    let options = api.calculate_shipping("01310-100", &quote_lines(&items)).await;

    assert_eq!(options.len(), 2);
    let pac = by_provider(&options, "PAC");
    assert!(pac.free);
    assert_eq!(pac.price, Decimal::ZERO);
    assert_eq!(pac.original_price, Some(Decimal::new(2590, 2)));
    assert_eq!(pac.days, 8);
    assert_eq!(pac.price_label(), "Grátis");
    assert!(by_provider(&options, "SEDEX").free);

    let requests = backend.quote_requests().await;
    assert_eq!(requests[0]["cep"], "01310-100");
    assert_eq!(requests[0]["subtotal"], 250.0);
    assert_eq!(requests[0]["items"][0]["quantity"], 2);
}

#[tokio::test]
async fn test_other_regions_pay_until_global_threshold() {
    let backend = FakeBackend::start(carrier_quotes()).await.unwrap();
    configure(&backend).await;
    let dir = tempfile::tempdir().unwrap();
    let api = storefront(&backend, &dir).await;

    let options = api
        .calculate_shipping("20040-002", &quote_lines(&[line(12500, 2)]))
        .await;
    let sedex = by_provider(&options, "SEDEX");
    assert!(!sedex.free);
    assert_eq!(sedex.price, Decimal::new(4150, 2));
    assert_eq!(sedex.price_label(), "R$ 41,50");

    let options = api
        .calculate_shipping("20040-002", &quote_lines(&[line(40000, 2)]))
        .await;
    assert!(options.iter().all(|o| o.free && o.price.is_zero()));
}

#[tokio::test]
async fn test_unconfigured_store_offers_every_priced_carrier() {
    let backend = FakeBackend::start(carrier_quotes()).await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let api = storefront(&backend, &dir).await;

    let options = api
        .calculate_shipping("01310-100", &quote_lines(&[line(99990, 1)]))
        .await;

    let mut providers: Vec<&str> = options.iter().map(|o| o.provider.as_str()).collect();
    providers.sort_unstable();
    assert_eq!(providers, ["Loggi", "PAC", "SEDEX"]);
    assert!(options.iter().all(|o| !o.free));
}
