//! Database seeder for Tegoed development and testing.
//!
//! Seeds a sponsor municipality with an active fund, provider shops in all
//! three application states, products, vouchers with their token pairs, and
//! a short redemption history for local development and testing purposes.
//!
//! Usage: cargo run --bin seeder

use chrono::{Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use uuid::Uuid;

use tegoed_db::entities::{
    employee_permissions, employees, fund_providers, funds, organizations, product_categories,
    products,
    sea_orm_active_enums::{FundProviderState, FundState},
    voucher_transactions, vouchers,
};
use tegoed_db::repositories::{
    CreateVoucherInput, PERM_MANAGE_PROVIDERS, PERM_SCAN_VOUCHERS, PERM_VIEW_FINANCES, RedeemInput,
    TransactionRepository, VoucherRepository,
};

/// Sponsor municipality ID (consistent for all seeds)
const SPONSOR_ORG_ID: &str = "00000000-0000-0000-0000-000000000001";
/// Toy shop provider ID (application approved)
const TOY_SHOP_ORG_ID: &str = "00000000-0000-0000-0000-000000000002";
/// Bookshop provider ID (application approved)
const BOOK_SHOP_ORG_ID: &str = "00000000-0000-0000-0000-000000000003";
/// Sports club provider ID (application left pending)
const SPORTS_CLUB_ORG_ID: &str = "00000000-0000-0000-0000-000000000004";
/// Bike shop provider ID (application declined)
const BIKE_SHOP_ORG_ID: &str = "00000000-0000-0000-0000-000000000005";
/// Child benefit fund ID
const CHILD_FUND_ID: &str = "00000000-0000-0000-0000-000000000010";
/// Swim lesson fund ID (not yet open)
const SWIM_FUND_ID: &str = "00000000-0000-0000-0000-000000000011";
/// Product ID for the toy shop's building blocks
const BLOCKS_PRODUCT_ID: &str = "00000000-0000-0000-0000-000000000040";
/// Product ID for the toy shop's board game
const BOARD_GAME_PRODUCT_ID: &str = "00000000-0000-0000-0000-000000000041";
/// Product ID for the bookshop's atlas
const ATLAS_PRODUCT_ID: &str = "00000000-0000-0000-0000-000000000042";
/// Product ID for the bookshop's reading starter set
const READING_SET_PRODUCT_ID: &str = "00000000-0000-0000-0000-000000000043";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set in environment");

    println!("Connecting to database...");
    let db = tegoed_db::connect(&database_url)
        .await
        .expect("Failed to connect to database");

    println!("Seeding organizations...");
    seed_organizations(&db).await;

    println!("Seeding employees...");
    seed_employees(&db).await;

    println!("Seeding funds...");
    seed_funds(&db).await;

    println!("Seeding product categories and products...");
    seed_products(&db).await;

    println!("Seeding provider applications...");
    seed_provider_applications(&db).await;

    println!("Seeding vouchers...");
    seed_vouchers(&db).await;

    println!("Seeding redemptions...");
    seed_redemptions(&db).await;

    println!("Seeding complete!");
}

fn fixed_id(value: &str) -> Uuid {
    Uuid::parse_str(value).unwrap()
}

/// Seeds the sponsor municipality and four provider shops.
async fn seed_organizations(db: &DatabaseConnection) {
    let rows = [
        (
            SPONSOR_ORG_ID,
            "seed-org-zuidhorn",
            "Gemeente Zuidhorn",
            "kindpakket@zuidhorn.nl",
            Some("+31 594 508 888"),
        ),
        (
            TOY_SHOP_ORG_ID,
            "seed-org-devlieger",
            "Speelgoed De Vlieger",
            "info@devlieger.nl",
            Some("+31 594 212 121"),
        ),
        (
            BOOK_SHOP_ORG_ID,
            "seed-org-akkerman",
            "Boekhandel Akkerman",
            "winkel@akkerman.nl",
            None,
        ),
        (
            SPORTS_CLUB_ORG_ID,
            "seed-org-quicksilver",
            "Sportclub Quicksilver",
            "leden@quicksilver.nl",
            None,
        ),
        (
            BIKE_SHOP_ORG_ID,
            "seed-org-pot",
            "Rijwielhandel Pot",
            "werkplaats@rijwielpot.nl",
            Some("+31 594 505 050"),
        ),
    ];

    let mut inserted = 0;
    for (id, address, name, email, phone) in rows {
        let org = organizations::ActiveModel {
            id: Set(fixed_id(id)),
            identity_address: Set(address.to_string()),
            name: Set(name.to_string()),
            email: Set(email.to_string()),
            phone: Set(phone.map(ToString::to_string)),
            created_at: Set(Utc::now().into()),
            updated_at: Set(Utc::now().into()),
        };

        if let Err(e) = org.insert(db).await {
            if !e.to_string().contains("duplicate key") {
                eprintln!("Failed to insert organization {name}: {e}");
            }
        } else {
            inserted += 1;
        }
    }

    println!("  Inserted {inserted} organizations");
}

/// Seeds one employee per organization along with their permissions.
async fn seed_employees(db: &DatabaseConnection) {
    let rows = [
        (
            "00000000-0000-0000-0000-000000000021",
            SPONSOR_ORG_ID,
            "seed-anna-dijkstra",
            "Anna Dijkstra",
            "a.dijkstra@zuidhorn.nl",
            &[PERM_MANAGE_PROVIDERS, PERM_VIEW_FINANCES][..],
        ),
        (
            "00000000-0000-0000-0000-000000000022",
            TOY_SHOP_ORG_ID,
            "seed-willem-deboer",
            "Willem de Boer",
            "willem@devlieger.nl",
            &[PERM_SCAN_VOUCHERS, PERM_VIEW_FINANCES][..],
        ),
        (
            "00000000-0000-0000-0000-000000000023",
            BOOK_SHOP_ORG_ID,
            "seed-sanne-visser",
            "Sanne Visser",
            "sanne@akkerman.nl",
            &[PERM_SCAN_VOUCHERS, PERM_VIEW_FINANCES][..],
        ),
    ];

    let mut inserted = 0;
    for (id, org_id, address, name, email, permissions) in rows {
        let employee_id = fixed_id(id);
        let employee = employees::ActiveModel {
            id: Set(employee_id),
            organization_id: Set(fixed_id(org_id)),
            identity_address: Set(address.to_string()),
            name: Set(name.to_string()),
            email: Set(email.to_string()),
            created_at: Set(Utc::now().into()),
            updated_at: Set(Utc::now().into()),
        };

        if let Err(e) = employee.insert(db).await {
            if !e.to_string().contains("duplicate key") {
                eprintln!("Failed to insert employee {name}: {e}");
            }
        } else {
            inserted += 1;
        }

        for permission in permissions {
            let grant = employee_permissions::ActiveModel {
                employee_id: Set(employee_id),
                permission: Set((*permission).to_string()),
                created_at: Set(Utc::now().into()),
            };

            if let Err(e) = grant.insert(db).await {
                if !e.to_string().contains("duplicate key") {
                    eprintln!("Failed to grant {permission} to {name}: {e}");
                }
            }
        }
    }

    println!("  Inserted {inserted} employees");
}

/// Seeds an active child benefit fund and a waiting swim lesson fund.
async fn seed_funds(db: &DatabaseConnection) {
    let year = Utc::now().year();
    let rows = [
        (
            CHILD_FUND_ID,
            "Kindpakket",
            FundState::Active,
            Decimal::new(25_000, 2),
        ),
        (
            SWIM_FUND_ID,
            "Zwemfonds",
            FundState::Waiting,
            Decimal::new(15_000, 2),
        ),
    ];

    let mut inserted = 0;
    for (id, name, state, allocation) in rows {
        let fund = funds::ActiveModel {
            id: Set(fixed_id(id)),
            organization_id: Set(fixed_id(SPONSOR_ORG_ID)),
            name: Set(format!("{name} {year}")),
            state: Set(state),
            start_date: Set(NaiveDate::from_ymd_opt(year, 1, 1).unwrap()),
            end_date: Set(NaiveDate::from_ymd_opt(year, 12, 31).unwrap()),
            allocation_amount: Set(allocation),
            created_at: Set(Utc::now().into()),
            updated_at: Set(Utc::now().into()),
        };

        if let Err(e) = fund.insert(db).await {
            if !e.to_string().contains("duplicate key") {
                eprintln!("Failed to insert fund {name}: {e}");
            }
        } else {
            inserted += 1;
        }
    }

    println!("  Inserted {inserted} funds");
}

/// Seeds product categories and the provider shops' products.
async fn seed_products(db: &DatabaseConnection) {
    let categories = [
        ("00000000-0000-0000-0000-000000000030", "toys", "Toys"),
        ("00000000-0000-0000-0000-000000000031", "books", "Books"),
        ("00000000-0000-0000-0000-000000000032", "sports", "Sports"),
    ];

    let mut inserted = 0;
    for (id, key, name) in categories {
        let category = product_categories::ActiveModel {
            id: Set(fixed_id(id)),
            key: Set(key.to_string()),
            name: Set(name.to_string()),
            created_at: Set(Utc::now().into()),
            updated_at: Set(Utc::now().into()),
        };

        if let Err(e) = category.insert(db).await {
            if !e.to_string().contains("duplicate key") {
                eprintln!("Failed to insert product category {key}: {e}");
            }
        } else {
            inserted += 1;
        }
    }

    println!("  Inserted {inserted} product categories");

    let rows = [
        (
            BLOCKS_PRODUCT_ID,
            TOY_SHOP_ORG_ID,
            "00000000-0000-0000-0000-000000000030",
            "Wooden building blocks",
            Decimal::new(3_495, 2),
        ),
        (
            BOARD_GAME_PRODUCT_ID,
            TOY_SHOP_ORG_ID,
            "00000000-0000-0000-0000-000000000030",
            "Family board game",
            Decimal::new(2_450, 2),
        ),
        (
            ATLAS_PRODUCT_ID,
            BOOK_SHOP_ORG_ID,
            "00000000-0000-0000-0000-000000000031",
            "Children's atlas",
            Decimal::new(2_999, 2),
        ),
        (
            READING_SET_PRODUCT_ID,
            BOOK_SHOP_ORG_ID,
            "00000000-0000-0000-0000-000000000031",
            "Reading starter set",
            Decimal::new(1_995, 2),
        ),
    ];

    let mut inserted = 0;
    for (id, org_id, category_id, name, price) in rows {
        let product = products::ActiveModel {
            id: Set(fixed_id(id)),
            organization_id: Set(fixed_id(org_id)),
            product_category_id: Set(Some(fixed_id(category_id))),
            name: Set(name.to_string()),
            price: Set(price),
            created_at: Set(Utc::now().into()),
            updated_at: Set(Utc::now().into()),
        };

        if let Err(e) = product.insert(db).await {
            if !e.to_string().contains("duplicate key") {
                eprintln!("Failed to insert product {name}: {e}");
            }
        } else {
            inserted += 1;
        }
    }

    println!("  Inserted {inserted} products");
}

/// Seeds provider applications on the child fund, one per state.
async fn seed_provider_applications(db: &DatabaseConnection) {
    let rows = [
        (
            "00000000-0000-0000-0000-000000000050",
            TOY_SHOP_ORG_ID,
            FundProviderState::Approved,
        ),
        (
            "00000000-0000-0000-0000-000000000051",
            BOOK_SHOP_ORG_ID,
            FundProviderState::Approved,
        ),
        (
            "00000000-0000-0000-0000-000000000052",
            SPORTS_CLUB_ORG_ID,
            FundProviderState::Pending,
        ),
        (
            "00000000-0000-0000-0000-000000000053",
            BIKE_SHOP_ORG_ID,
            FundProviderState::Declined,
        ),
    ];

    let mut inserted = 0;
    for (id, org_id, state) in rows {
        let application = fund_providers::ActiveModel {
            id: Set(fixed_id(id)),
            fund_id: Set(fixed_id(CHILD_FUND_ID)),
            organization_id: Set(fixed_id(org_id)),
            state: Set(state),
            created_at: Set(Utc::now().into()),
            updated_at: Set(Utc::now().into()),
        };

        if let Err(e) = application.insert(db).await {
            if !e.to_string().contains("duplicate key") {
                eprintln!("Failed to insert provider application: {e}");
            }
        } else {
            inserted += 1;
        }
    }

    println!("  Inserted {inserted} provider applications");
}

/// Seeds vouchers with their token pairs for three test residents.
async fn seed_vouchers(db: &DatabaseConnection) {
    use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

    // Voucher IDs are minted at creation, so idempotency hangs on the
    // holder address instead.
    let existing = vouchers::Entity::find()
        .filter(vouchers::Column::IdentityAddress.eq("seed-resident-1"))
        .one(db)
        .await
        .ok()
        .flatten();
    if existing.is_some() {
        println!("  Vouchers already exist, skipping...");
        return;
    }

    let repo = VoucherRepository::new(db.clone());
    let fund_id = fixed_id(CHILD_FUND_ID);

    let first = create_voucher(
        &repo,
        CreateVoucherInput {
            fund_id,
            identity_address: "seed-resident-1".to_string(),
            product_id: None,
            parent_id: None,
            expire_at: None,
        },
    )
    .await;

    // A product voucher carved out of the first resident's allocation.
    if let Some(parent) = &first {
        create_voucher(
            &repo,
            CreateVoucherInput {
                fund_id,
                identity_address: "seed-resident-1".to_string(),
                product_id: Some(fixed_id(BLOCKS_PRODUCT_ID)),
                parent_id: Some(parent.id),
                expire_at: None,
            },
        )
        .await;
    }

    create_voucher(
        &repo,
        CreateVoucherInput {
            fund_id,
            identity_address: "seed-resident-2".to_string(),
            product_id: None,
            parent_id: None,
            expire_at: None,
        },
    )
    .await;

    // Expires inside the reminder window, so the reminder task has work.
    create_voucher(
        &repo,
        CreateVoucherInput {
            fund_id,
            identity_address: "seed-resident-3".to_string(),
            product_id: None,
            parent_id: None,
            expire_at: Some(Utc::now() + Duration::days(28)),
        },
    )
    .await;
}

/// Creates one voucher and prints its token addresses.
async fn create_voucher(
    repo: &VoucherRepository,
    input: CreateVoucherInput,
) -> Option<vouchers::Model> {
    let holder = input.identity_address.clone();
    match repo.create(input).await {
        Ok(created) => {
            println!("  Created voucher {} for {holder}", created.voucher.id);
            for token in &created.tokens {
                println!(
                    "    token address: {} (confirmation required: {})",
                    token.address, token.need_confirmation
                );
            }
            Some(created.voucher)
        }
        Err(e) => {
            eprintln!("Failed to create voucher for {holder}: {e}");
            None
        }
    }
}

/// Seeds a short redemption history: settled, pending, and canceled rows.
async fn seed_redemptions(db: &DatabaseConnection) {
    let vouchers_repo = VoucherRepository::new(db.clone());
    let transactions = TransactionRepository::new(db.clone());

    let Some(first) = regular_voucher(&vouchers_repo, "seed-resident-1").await else {
        eprintln!("No voucher for seed-resident-1, skipping redemptions");
        return;
    };

    match vouchers_repo.transaction_count(first.id).await {
        Ok(0) => {}
        Ok(_) => {
            println!("  Redemptions already exist, skipping...");
            return;
        }
        Err(e) => {
            eprintln!("Failed to check redemptions: {e}");
            return;
        }
    }

    let toy_shop = fixed_id(TOY_SHOP_ORG_ID);
    let book_shop = fixed_id(BOOK_SHOP_ORG_ID);
    let mut recorded = 0;

    // Resident 1 buys a board game (settled) and an atlas (still pending).
    if let Some(row) = redeem_at(
        &vouchers_repo,
        &first,
        toy_shop,
        Some(fixed_id(BOARD_GAME_PRODUCT_ID)),
        Decimal::new(2_450, 2),
    )
    .await
    {
        recorded += 1;
        if let Err(e) = transactions.mark_success(row.id, 910_001, Utc::now()).await {
            eprintln!("Failed to settle transaction {}: {e}", row.id);
        }
    }
    if redeem_at(
        &vouchers_repo,
        &first,
        book_shop,
        Some(fixed_id(ATLAS_PRODUCT_ID)),
        Decimal::new(2_999, 2),
    )
    .await
    .is_some()
    {
        recorded += 1;
    }

    // The product voucher is spent in full at the toy shop.
    if let Some(blocks) = product_voucher(&vouchers_repo, "seed-resident-1").await {
        let amount = blocks.amount;
        if let Some(row) =
            redeem_at(&vouchers_repo, &blocks, toy_shop, blocks.product_id, amount).await
        {
            recorded += 1;
            if let Err(e) = transactions.mark_success(row.id, 910_002, Utc::now()).await {
                eprintln!("Failed to settle transaction {}: {e}", row.id);
            }
        }
    }

    // Resident 2's bookshop purchase fell through and was canceled. The toy
    // shop one is a till sale with no product registered, so the finances
    // report has an uncategorized row to count.
    if let Some(second) = regular_voucher(&vouchers_repo, "seed-resident-2").await {
        if let Some(row) = redeem_at(
            &vouchers_repo,
            &second,
            book_shop,
            Some(fixed_id(READING_SET_PRODUCT_ID)),
            Decimal::new(1_995, 2),
        )
        .await
        {
            recorded += 1;
            if let Err(e) = transactions.mark_canceled(row.id, Utc::now()).await {
                eprintln!("Failed to cancel transaction {}: {e}", row.id);
            }
        }
        if let Some(row) =
            redeem_at(&vouchers_repo, &second, toy_shop, None, Decimal::new(3_495, 2)).await
        {
            recorded += 1;
            if let Err(e) = transactions.mark_success(row.id, 910_003, Utc::now()).await {
                eprintln!("Failed to settle transaction {}: {e}", row.id);
            }
        }
    }

    println!("  Recorded {recorded} redemptions");
}

/// Finds a holder's plain fund voucher.
async fn regular_voucher(repo: &VoucherRepository, holder: &str) -> Option<vouchers::Model> {
    let rows = match repo.list_for_identity(holder).await {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("Failed to list vouchers for {holder}: {e}");
            return None;
        }
    };
    rows.into_iter()
        .map(|row| row.voucher)
        .find(|voucher| voucher.product_id.is_none() && voucher.parent_id.is_none())
}

/// Finds a holder's product voucher.
async fn product_voucher(repo: &VoucherRepository, holder: &str) -> Option<vouchers::Model> {
    let rows = match repo.list_for_identity(holder).await {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("Failed to list vouchers for {holder}: {e}");
            return None;
        }
    };
    rows.into_iter()
        .map(|row| row.voucher)
        .find(|voucher| voucher.product_id.is_some())
}

/// Records one redemption against a voucher's share-safe token.
async fn redeem_at(
    repo: &VoucherRepository,
    voucher: &vouchers::Model,
    organization_id: Uuid,
    product_id: Option<Uuid>,
    amount: Decimal,
) -> Option<voucher_transactions::Model> {
    let tokens = match repo.tokens_for_voucher(voucher.id).await {
        Ok(tokens) => tokens,
        Err(e) => {
            eprintln!("Failed to load tokens for voucher {}: {e}", voucher.id);
            return None;
        }
    };
    let Some(token) = tokens.into_iter().find(|token| !token.need_confirmation) else {
        eprintln!("No share token for voucher {}", voucher.id);
        return None;
    };

    match repo
        .redeem(RedeemInput {
            voucher_id: voucher.id,
            organization_id,
            product_id,
            token_address: token.address,
            amount,
        })
        .await
    {
        Ok(row) => Some(row),
        Err(e) => {
            eprintln!("Failed to record redemption: {e}");
            None
        }
    }
}
