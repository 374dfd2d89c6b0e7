/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
pub mod internal {
    pub mod order;
}
pub mod ui {
    pub mod healthcheck;
    pub mod location;
    pub mod routing;
}

use actix_web::web::ServiceConfig;

pub fn handler(config: &mut ServiceConfig) {
    config
        .service(ui::location::submit_driver_location)
        .service(ui::location::submit_customer_location)
        .service(ui::location::disconnect)
        .service(ui::location::driver_events)
        .service(ui::location::customer_events)
        .service(ui::routing::route)
        .service(ui::routing::geocode)
        .service(ui::healthcheck::health_check)
        .service(internal::order::order_details)
        .service(internal::order::close_order);
}
