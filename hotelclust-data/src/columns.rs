/// Colonnes exploitables comme features, dans l'ordre des tokens une fois
/// les colonnes propres à l'entraînement (ou au scoring) retirées.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    DateTime,
    SiteName,
    PosaContinent,
    UserLocationCountry,
    UserLocationRegion,
    UserLocationCity,
    OrigDestinationDistance,
    UserId,
    IsMobile,
    IsPackage,
    Channel,
    SrchCi,
    SrchCo,
    SrchAdultsCnt,
    SrchChildrenCnt,
    SrchRmCnt,
    SrchDestinationId,
    SrchDestinationTypeId,
    HotelContinent,
    HotelCountry,
    HotelMarket,
}

impl Column {
    pub const ALL: [Column; 21] = [
        Column::DateTime,
        Column::SiteName,
        Column::PosaContinent,
        Column::UserLocationCountry,
        Column::UserLocationRegion,
        Column::UserLocationCity,
        Column::OrigDestinationDistance,
        Column::UserId,
        Column::IsMobile,
        Column::IsPackage,
        Column::Channel,
        Column::SrchCi,
        Column::SrchCo,
        Column::SrchAdultsCnt,
        Column::SrchChildrenCnt,
        Column::SrchRmCnt,
        Column::SrchDestinationId,
        Column::SrchDestinationTypeId,
        Column::HotelContinent,
        Column::HotelCountry,
        Column::HotelMarket,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::DateTime => "date_time",
            Column::SiteName => "site_name",
            Column::PosaContinent => "posa_continent",
            Column::UserLocationCountry => "user_location_country",
            Column::UserLocationRegion => "user_location_region",
            Column::UserLocationCity => "user_location_city",
            Column::OrigDestinationDistance => "orig_destination_distance",
            Column::UserId => "user_id",
            Column::IsMobile => "is_mobile",
            Column::IsPackage => "is_package",
            Column::Channel => "channel",
            Column::SrchCi => "srch_ci",
            Column::SrchCo => "srch_co",
            Column::SrchAdultsCnt => "srch_adults_cnt",
            Column::SrchChildrenCnt => "srch_children_cnt",
            Column::SrchRmCnt => "srch_rm_cnt",
            Column::SrchDestinationId => "srch_destination_id",
            Column::SrchDestinationTypeId => "srch_destination_type_id",
            Column::HotelContinent => "hotel_continent",
            Column::HotelCountry => "hotel_country",
            Column::HotelMarket => "hotel_market",
        }
    }

    /// Position dans la séquence de tokens convergée (identique pour les deux formes).
    pub fn position(&self) -> usize {
        *self as usize
    }
}

/// Colonnes utilisées telles quelles (cast en f64, vide → 0.0), dans l'ordre du vecteur.
pub const RAW_FEATURES: [Column; 18] = [
    Column::SiteName,
    Column::PosaContinent,
    Column::UserLocationCountry,
    Column::UserLocationRegion,
    Column::UserLocationCity,
    Column::OrigDestinationDistance,
    Column::UserId,
    Column::IsMobile,
    Column::IsPackage,
    Column::Channel,
    Column::SrchAdultsCnt,
    Column::SrchChildrenCnt,
    Column::SrchRmCnt,
    Column::SrchDestinationId,
    Column::SrchDestinationTypeId,
    Column::HotelContinent,
    Column::HotelCountry,
    Column::HotelMarket,
];

/// En-tête attendu après parsing, quelle que soit la forme du fichier.
pub fn expected_header() -> Vec<&'static str> {
    Column::ALL.iter().map(|c| c.name()).collect()
}

/// Rôle d'une colonne brute du fichier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Id,
    IsBooking,
    Count,
    Label,
    Feature(Column),
}

impl Slot {
    pub fn name(&self) -> &'static str {
        match self {
            Slot::Id => "id",
            Slot::IsBooking => "is_booking",
            Slot::Count => "cnt",
            Slot::Label => "hotel_cluster",
            Slot::Feature(c) => c.name(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Fichier d'entraînement (train.csv) : is_booking, cnt et hotel_cluster en plus.
    Labeled,
    /// Fichier de scoring (test.csv) : id en tête.
    Unlabeled,
}

const LABELED_LAYOUT: [Slot; 24] = [
    Slot::Feature(Column::DateTime),
    Slot::Feature(Column::SiteName),
    Slot::Feature(Column::PosaContinent),
    Slot::Feature(Column::UserLocationCountry),
    Slot::Feature(Column::UserLocationRegion),
    Slot::Feature(Column::UserLocationCity),
    Slot::Feature(Column::OrigDestinationDistance),
    Slot::Feature(Column::UserId),
    Slot::Feature(Column::IsMobile),
    Slot::Feature(Column::IsPackage),
    Slot::Feature(Column::Channel),
    Slot::Feature(Column::SrchCi),
    Slot::Feature(Column::SrchCo),
    Slot::Feature(Column::SrchAdultsCnt),
    Slot::Feature(Column::SrchChildrenCnt),
    Slot::Feature(Column::SrchRmCnt),
    Slot::Feature(Column::SrchDestinationId),
    Slot::Feature(Column::SrchDestinationTypeId),
    Slot::IsBooking,
    Slot::Count,
    Slot::Feature(Column::HotelContinent),
    Slot::Feature(Column::HotelCountry),
    Slot::Feature(Column::HotelMarket),
    Slot::Label,
];

const UNLABELED_LAYOUT: [Slot; 22] = [
    Slot::Id,
    Slot::Feature(Column::DateTime),
    Slot::Feature(Column::SiteName),
    Slot::Feature(Column::PosaContinent),
    Slot::Feature(Column::UserLocationCountry),
    Slot::Feature(Column::UserLocationRegion),
    Slot::Feature(Column::UserLocationCity),
    Slot::Feature(Column::OrigDestinationDistance),
    Slot::Feature(Column::UserId),
    Slot::Feature(Column::IsMobile),
    Slot::Feature(Column::IsPackage),
    Slot::Feature(Column::Channel),
    Slot::Feature(Column::SrchCi),
    Slot::Feature(Column::SrchCo),
    Slot::Feature(Column::SrchAdultsCnt),
    Slot::Feature(Column::SrchChildrenCnt),
    Slot::Feature(Column::SrchRmCnt),
    Slot::Feature(Column::SrchDestinationId),
    Slot::Feature(Column::SrchDestinationTypeId),
    Slot::Feature(Column::HotelContinent),
    Slot::Feature(Column::HotelCountry),
    Slot::Feature(Column::HotelMarket),
];

impl RecordKind {
    pub fn layout(&self) -> &'static [Slot] {
        match self {
            RecordKind::Labeled => &LABELED_LAYOUT,
            RecordKind::Unlabeled => &UNLABELED_LAYOUT,
        }
    }

    pub fn width(&self) -> usize {
        self.layout().len()
    }

    pub fn position_of(&self, slot: Slot) -> Option<usize> {
        self.layout().iter().position(|&s| s == slot)
    }

    pub fn is_labeled(&self) -> bool {
        matches!(self, RecordKind::Labeled)
    }

    /// En-tête brut du fichier (avant retrait des colonnes spécifiques).
    pub fn raw_header(&self) -> String {
        self.layout().iter().map(|s| s.name()).collect::<Vec<_>>().join(",")
    }
}
