// Diesel schema for the property store.

diesel::table! {
    properties (id) {
        id -> Text,
        url -> Text,
        tipo_operacion -> Nullable<Text>,
        tipo_inmueble -> Nullable<Text>,
        direccion -> Nullable<Text>,
        barrio -> Nullable<Text>,
        metros_cuadrados_cubiertos -> Nullable<Double>,
        metros_cuadrados_totales -> Nullable<Double>,
        precio -> Nullable<Double>,
        moneda -> Nullable<Text>,
        cantidad_dormitorios -> Nullable<Integer>,
        cantidad_banos -> Nullable<Integer>,
        cantidad_ambientes -> Nullable<Integer>,
        tiene_patio -> Nullable<Bool>,
        tiene_quincho -> Nullable<Bool>,
        tiene_pileta -> Nullable<Bool>,
        tiene_cochera -> Nullable<Bool>,
        tiene_balcon -> Nullable<Bool>,
        tiene_terraza -> Nullable<Bool>,
        piso -> Nullable<Text>,
        orientacion -> Nullable<Text>,
        antiguedad -> Nullable<Integer>,
        descripcion_breve -> Nullable<Text>,
        costo_metro_cuadrado -> Nullable<Double>,
        status -> Text,
        created_at -> Text,
        scraped_at -> Text,
    }
}
