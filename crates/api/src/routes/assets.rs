//! Image URL resolution for responses.
//!
//! Images are stored as paths; responses carry absolute URLs under the
//! configured asset base.

use crate::config::ApiConfig;
use crate::models::{Cart, Image, Item};

fn resolve(images: &mut [Image], config: &ApiConfig) {
    for image in images {
        image.url = config.asset_url(&image.url);
    }
}

/// Rewrite an item's image paths to public URLs.
#[must_use]
pub fn item_with_urls(mut item: Item, config: &ApiConfig) -> Item {
    resolve(&mut item.images, config);
    item
}

/// Rewrite the image paths of every line in a cart to public URLs.
#[must_use]
pub fn cart_with_urls(mut cart: Cart, config: &ApiConfig) -> Cart {
    for line in &mut cart.lines {
        resolve(&mut line.item.images, config);
    }
    cart
}
