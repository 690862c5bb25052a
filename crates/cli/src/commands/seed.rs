//! Demo data bootstrap.
//!
//! # Usage
//!
//! ```bash
//! bs-cli seed demo --root-password '...' --admin-password '...'
//! ```
//!
//! The demo catalog is inserted only into an empty catalog. Demo accounts
//! (`root`, `admin`, `user`) are created only for the passwords supplied;
//! there are no built-in credentials.

use rust_decimal::Decimal;

use brokeshop_core::{Email, Price, Role, Username};
use brokeshop_storefront::db::ProductRepository;
use brokeshop_storefront::models::ProductDraft;
use brokeshop_storefront::services::{AuthError, AuthService};

use super::{CliError, connect};

/// Demo catalog: name, description, price, category, image file.
const DEMO_PRODUCTS: &[(&str, &str, i64, &str, &str)] = &[
    ("Pizza", "Stone-baked margherita", 850, "Mains", "pizza.jpg"),
    ("Burger", "Beef patty, cheddar, pickles", 450, "Street food", "burger.jpg"),
    ("Pasta", "Carbonara with pancetta", 650, "Mains", "pasta.jpg"),
    ("Greek salad", "Feta, olives, cucumber", 350, "Salads", "greek_salad.jpg"),
    ("Steak", "Ribeye, medium rare", 1200, "Mains", "steak.jpg"),
    ("Sandwich", "Ham and cheese on sourdough", 300, "Street food", "sandwich.jpg"),
    ("Salmon", "Grilled fillet with lemon", 950, "Mains", "salmon.jpg"),
    ("Hot-dog", "Smoked sausage, mustard", 250, "Street food", "hotdog.jpg"),
    ("Mashed potato", "With butter and herbs", 200, "Sides", "mashed_potato.jpg"),
    ("Scrambled eggs", "Three eggs, chives", 280, "Breakfast", "scrambled_eggs.jpg"),
    ("Barbecue", "Pork ribs in smoky sauce", 750, "Mains", "barbecue.jpg"),
    ("Tom Yum", "Spicy shrimp soup", 400, "Soups", "tom_yum.jpg"),
    ("French fries", "Crispy, salted", 180, "Sides", "french_fries.jpg"),
    ("Grilled chicken", "Half chicken, garlic sauce", 550, "Mains", "grilled_chicken.jpg"),
    ("Pie", "Apple pie slice", 320, "Desserts", "pie.jpg"),
];

/// Operator-supplied passwords for the demo accounts.
#[derive(Default)]
pub struct DemoPasswords {
    pub root: Option<String>,
    pub admin: Option<String>,
    pub user: Option<String>,
}

impl DemoPasswords {
    fn accounts(&self) -> impl Iterator<Item = (&'static str, Role, &str)> {
        [
            ("root", Role::Root, self.root.as_deref()),
            ("admin", Role::Admin, self.admin.as_deref()),
            ("user", Role::User, self.user.as_deref()),
        ]
        .into_iter()
        .filter_map(|(name, role, password)| password.map(|p| (name, role, p)))
    }
}

/// Insert the demo catalog and accounts.
pub async fn demo(passwords: &DemoPasswords) -> Result<(), CliError> {
    let pool = connect().await?;
    let products = ProductRepository::new(&pool);

    let existing = products.count().await?;
    if existing == 0 {
        for draft in demo_drafts() {
            products.create(&draft).await?;
        }
        tracing::info!("Inserted {} demo products", DEMO_PRODUCTS.len());
    } else {
        tracing::info!("Catalog has {existing} products, skipping demo catalog");
    }

    let auth = AuthService::new(&pool);
    for (name, role, password) in passwords.accounts() {
        let username = Username::parse(name).map_err(AuthError::from)?;
        let email = Email::parse(&format!("{name}@brokeshop.local")).map_err(AuthError::from)?;

        match auth.create_account(&username, &email, password, role).await {
            Ok(user) => tracing::info!("Created {role} account '{name}' (ID {})", user.id),
            Err(AuthError::UserAlreadyExists) => {
                tracing::warn!("Account '{name}' already exists, leaving it unchanged");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

fn demo_drafts() -> impl Iterator<Item = ProductDraft> {
    DEMO_PRODUCTS
        .iter()
        .map(|&(name, description, price, category, image)| ProductDraft {
            name: name.to_owned(),
            description: description.to_owned(),
            price: Price::new(Decimal::from(price)).unwrap_or(Price::ZERO),
            category: Some(category.to_owned()),
            image: Some(format!("/images/{image}")),
        })
}
